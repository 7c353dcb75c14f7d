//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::{style, Term};

use crate::crypto::ProgressListener;
use crate::vault::{AsymmetricKeyRecord, LockState, SymmetricKeyRecord};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of AES keys (Id, Name, Bits, Purpose, Created).
pub fn print_symmetric_table(keys: &[SymmetricKeyRecord]) {
    if keys.is_empty() {
        info("No AES keys stored yet.");
        tip("Run `keyvault aes generate <NAME>` to create one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Bits", "Purpose", "Created"]);

    for k in keys {
        table.add_row(vec![
            k.id.clone(),
            k.name.clone(),
            k.key_size_bits.to_string(),
            k.purpose_tag.clone(),
            k.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

/// Print a table of RSA keys (Id, Name, Bits, Private key, Created).
pub fn print_asymmetric_table(keys: &[AsymmetricKeyRecord]) {
    if keys.is_empty() {
        info("No RSA keys stored yet.");
        tip("Run `keyvault rsa generate <NAME>` to create a key pair.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Bits", "Private key", "Created"]);

    for k in keys {
        let private = match k.lock_state() {
            LockState::Locked => "password protected",
            LockState::Plaintext => "stored",
            LockState::PublicOnly => "none",
        };
        table.add_row(vec![
            k.id.clone(),
            k.name.clone(),
            k.key_size_bits.to_string(),
            private.to_string(),
            k.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

/// Percentage line on stderr, redrawn in place.  Silent when stderr
/// is not a terminal.
pub struct ProgressLine {
    term: Term,
    label: String,
}

impl ProgressLine {
    pub fn new(label: &str) -> Self {
        Self {
            term: Term::stderr(),
            label: label.to_string(),
        }
    }

    /// Remove the progress line.
    pub fn finish(&self) {
        if self.term.is_term() {
            let _ = self.term.clear_line();
        }
    }
}

impl ProgressListener for ProgressLine {
    fn on_progress(&mut self, percent: u8) {
        if self.term.is_term() {
            let _ = self.term.clear_line();
            let _ = self
                .term
                .write_str(&format!("{} {percent:>3}%", style(&self.label).dim()));
        }
    }
}
