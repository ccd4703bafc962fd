//! The yes/no confirmation consulted before any store mutation.

pub const CONFIRMATION_TITLE: &str = "Confirmation";

/// Single-shot prompt. Blocks until answered; anything other than an explicit
/// accept (including cancellation) counts as a decline.
pub trait ConfirmationGate {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: Fn(&str, &str) -> bool,
{
    fn confirm(&self, title: &str, message: &str) -> bool {
        self(title, message)
    }
}

/// Accepts every prompt without asking.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssumeYes;

impl ConfirmationGate for AssumeYes {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub title: &'static str,
    pub message: String,
}

impl Prompt {
    pub fn convert_tree() -> Self {
        Self::new("Convert all specified file types to markdown?")
    }

    pub fn undo_file(basename: &str) -> Self {
        Self::new(format!("Undo changes for {basename}?"))
    }

    pub fn undo_tree() -> Self {
        Self::new("Undo changes for all files in the specified directory?")
    }

    fn new(message: impl Into<String>) -> Self {
        Self {
            title: CONFIRMATION_TITLE,
            message: message.into(),
        }
    }

    pub fn ask<G: ConfirmationGate + ?Sized>(&self, gate: &G) -> bool {
        let accepted = gate.confirm(self.title, &self.message);
        tracing::debug!(message = %self.message, accepted, "confirmation answered");
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_act_as_gates() {
        let seen = RefCell::new(Vec::new());
        let gate = |title: &str, message: &str| {
            seen.borrow_mut().push(format!("{title}: {message}"));
            false
        };

        assert!(!Prompt::undo_file("main.rs").ask(&gate));
        assert_eq!(
            seen.into_inner(),
            vec!["Confirmation: Undo changes for main.rs?".to_string()]
        );
    }

    #[test]
    fn assume_yes_accepts() {
        assert!(Prompt::convert_tree().ask(&AssumeYes));
    }
}
