use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;

const USER_ROLE: &str = "user";
const FALLBACK_ROLE: &str = "assistant";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// A user turn followed by a turn from some other role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub question: Turn,
    pub reply: Turn,
}

impl Conversation {
    pub fn turns(&self) -> [&Turn; 2] {
        [&self.question, &self.reply]
    }
}

/// Builds one conversation from the corpus. Phrases are drawn with
/// replacement, so both turns may carry the same text.
pub fn generate<R: Rng + ?Sized>(corpus: &Corpus, rng: &mut R) -> Conversation {
    let question = Turn {
        role: USER_ROLE.to_owned(),
        content: pick_phrase(corpus, rng),
    };

    let other_roles: Vec<&String> = corpus
        .roles
        .iter()
        .filter(|role| !role.eq_ignore_ascii_case(USER_ROLE))
        .collect();
    let role = other_roles
        .choose(rng)
        .map(|role| role.to_string())
        .unwrap_or_else(|| FALLBACK_ROLE.to_owned());

    let reply = Turn {
        role,
        content: pick_phrase(corpus, rng),
    };

    Conversation { question, reply }
}

fn pick_phrase<R: Rng + ?Sized>(corpus: &Corpus, rng: &mut R) -> String {
    // The loader never hands out an empty corpus.
    corpus.phrases.choose(rng).cloned().unwrap_or_default()
}
