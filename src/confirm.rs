// src/confirm.rs

//! Presentation collaborators that put questions to the user
//!
//! One [`Confirmer`] is chosen per process mode and injected into the
//! package system: [`CommandLineConfirmer`] asks on a terminal,
//! [`ScriptedConfirmer`] answers from pre-configured decisions for
//! unattended runs.

use crate::config::Presentation;
use crate::verify::UpdateMessage;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

/// Answer from the assisted package-selection step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Accept the solver's proposal and go on
    Continue,
    Cancel,
    /// The dialog was closed without a decision
    Close,
}

/// Yes/no questions and reports shown during a transaction
pub trait Confirmer {
    /// Show `license` for `package`; `true` means accepted
    fn confirm_license(&mut self, package: &str, license: &str) -> bool;

    /// Ask whether the missing `packages` should be installed
    fn confirm_install(&mut self, packages: &[String]) -> bool;

    fn report_error(&mut self, message: &str);

    fn show_update_messages(&mut self, messages: &[UpdateMessage]);

    /// Offer manual resolution of a solver problem
    fn resolve_dependencies(&mut self, problem: &str) -> SelectionOutcome;
}

impl<C: Confirmer + ?Sized> Confirmer for Box<C> {
    fn confirm_license(&mut self, package: &str, license: &str) -> bool {
        (**self).confirm_license(package, license)
    }

    fn confirm_install(&mut self, packages: &[String]) -> bool {
        (**self).confirm_install(packages)
    }

    fn report_error(&mut self, message: &str) {
        (**self).report_error(message)
    }

    fn show_update_messages(&mut self, messages: &[UpdateMessage]) {
        (**self).show_update_messages(messages)
    }

    fn resolve_dependencies(&mut self, problem: &str) -> SelectionOutcome {
        (**self).resolve_dependencies(problem)
    }
}

/// Terminal confirmer reading answers line by line
pub struct CommandLineConfirmer<R, W> {
    input: R,
    output: W,
}

impl CommandLineConfirmer<io::StdinLock<'static>, io::Stdout> {
    /// Confirmer bound to the process terminal
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> CommandLineConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `question` and read one answer; `None` on end of input
    fn ask(&mut self, question: &str) -> Option<bool> {
        let prompt = write!(self.output, "{} [y/N] ", question).and_then(|_| self.output.flush());
        if let Err(e) = prompt {
            warn!("Failed to write prompt: {}", e);
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let answer = line.trim().to_ascii_lowercase();
                Some(answer == "y" || answer == "yes")
            }
            Err(e) => {
                warn!("Failed to read answer: {}", e);
                None
            }
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{}", text) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<R: BufRead, W: Write> Confirmer for CommandLineConfirmer<R, W> {
    fn confirm_license(&mut self, package: &str, license: &str) -> bool {
        self.say(&format!("License agreement for {}:\n", package));
        self.say(license);
        self.say("");
        self.ask(&format!("Do you accept the license of {}?", package))
            .unwrap_or(false)
    }

    fn confirm_install(&mut self, packages: &[String]) -> bool {
        self.say("The following packages need to be installed:");
        for package in packages {
            self.say(&format!("  {}", package));
        }
        self.ask("Install them now?").unwrap_or(false)
    }

    fn report_error(&mut self, message: &str) {
        self.say(&format!("Error: {}", message));
    }

    fn show_update_messages(&mut self, messages: &[UpdateMessage]) {
        for message in messages {
            self.say(&format!("Message from {}:\n{}", message.package, message.text));
        }
    }

    fn resolve_dependencies(&mut self, problem: &str) -> SelectionOutcome {
        self.say("The dependency solver reported a problem:");
        self.say(problem);
        match self.ask("Continue with the proposed solution?") {
            Some(true) => SelectionOutcome::Continue,
            Some(false) => SelectionOutcome::Cancel,
            None => SelectionOutcome::Close,
        }
    }
}

/// Non-interactive confirmer answering from fixed decisions
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfirmer {
    pub accept_licenses: bool,
    pub accept_solver_proposal: bool,
    pub install_missing: bool,
}

impl ScriptedConfirmer {
    /// Answers "yes" to every question
    pub fn accept_all() -> Self {
        Self {
            accept_licenses: true,
            accept_solver_proposal: true,
            install_missing: true,
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm_license(&mut self, package: &str, _license: &str) -> bool {
        if self.accept_licenses {
            info!("Accepting license of {} without prompting", package);
        } else {
            warn!("License of {} requires confirmation, declining", package);
        }
        self.accept_licenses
    }

    fn confirm_install(&mut self, packages: &[String]) -> bool {
        info!("Missing packages {:?}: install = {}", packages, self.install_missing);
        self.install_missing
    }

    fn report_error(&mut self, message: &str) {
        error!("{}", message);
    }

    fn show_update_messages(&mut self, messages: &[UpdateMessage]) {
        for message in messages {
            info!("Message from {}: {}", message.package, message.text);
        }
    }

    fn resolve_dependencies(&mut self, problem: &str) -> SelectionOutcome {
        if self.accept_solver_proposal {
            warn!("Continuing despite solver problem: {}", problem);
            SelectionOutcome::Continue
        } else {
            SelectionOutcome::Cancel
        }
    }
}

/// The confirmer matching a process' presentation mode
pub fn confirmer_for(presentation: Presentation) -> Box<dyn Confirmer> {
    match presentation {
        Presentation::Interactive => Box::new(CommandLineConfirmer::stdio()),
        Presentation::Scripted {
            accept_licenses,
            accept_solver_proposal,
        } => Box::new(ScriptedConfirmer {
            accept_licenses,
            accept_solver_proposal,
            install_missing: true,
        }),
    }
}
