//! Shared code editor reconciliation.
//!
//! Local keystrokes are debounced into one wholesale `code-update`;
//! language switches bypass the debounce and reset the buffer to that
//! language's starter template. Applying a remote update arms a short
//! cooldown so the editor change callback it triggers is not re-broadcast.

use events::{ClientEvent, CodeDocument};
use tokio::time::{Duration, Instant};

use crate::sync::{Cooldown, Debounce};

/// Trailing window before a settled local edit goes on the wire.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);
/// Suppression window after applying remote state.
pub const REMOTE_APPLY_COOLDOWN: Duration = Duration::from_millis(100);

/// Starter buffer for a language. Unknown languages start empty.
#[must_use]
pub fn language_template(language: &str) -> &'static str {
    match language {
        "python" => PYTHON_TEMPLATE,
        "javascript" => JAVASCRIPT_TEMPLATE,
        "cpp" => CPP_TEMPLATE,
        "java" => JAVA_TEMPLATE,
        "c" => C_TEMPLATE,
        _ => "",
    }
}

/// Reconciliation machine for the shared code buffer.
#[derive(Debug)]
pub struct CodeSync {
    origin: String,
    document: CodeDocument,
    debounce: Debounce,
    cooldown: Cooldown,
}

impl CodeSync {
    /// `origin` is this client's connection id, used to drop echoes of its
    /// own updates.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        let document = CodeDocument {
            text: language_template("python").to_owned(),
            ..CodeDocument::default()
        };
        Self {
            origin: origin.into(),
            document,
            debounce: Debounce::new(DEBOUNCE_WINDOW),
            cooldown: Cooldown::new(REMOTE_APPLY_COOLDOWN),
        }
    }

    #[must_use]
    pub fn document(&self) -> &CodeDocument {
        &self.document
    }

    /// When the pending flush becomes due, for the driver loop.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Record a local edit. Edits made while the remote-apply cooldown is
    /// open are the editor reacting to the applied state, not the user; the
    /// buffer is updated but nothing is scheduled for the wire.
    pub fn local_edit(&mut self, text: &str) {
        self.document.text = text.to_owned();
        if !self.cooldown.active() {
            self.debounce.touch();
        }
    }

    /// Switch language, resetting the buffer to the language template.
    ///
    /// The switch goes on the wire immediately: unlike keystrokes it is a
    /// single deliberate action, and peers must not keep typing into a
    /// buffer whose language already changed.
    pub fn change_language(&mut self, language: &str) -> Option<ClientEvent> {
        if self.cooldown.active() || language == self.document.language {
            return None;
        }
        self.document = CodeDocument {
            text: language_template(language).to_owned(),
            language: language.to_owned(),
        };
        self.debounce.cancel();
        Some(ClientEvent::LanguageUpdate {
            text: self.document.text.clone(),
            language: self.document.language.clone(),
            origin: self.origin.clone(),
        })
    }

    /// Take the settled local edit once its debounce window has elapsed.
    pub fn flush(&mut self) -> Option<ClientEvent> {
        if !self.debounce.flush_due() {
            return None;
        }
        Some(ClientEvent::CodeUpdate {
            text: self.document.text.clone(),
            language: self.document.language.clone(),
            origin: self.origin.clone(),
        })
    }

    /// Apply a remote update. Returns false for echoes of our own updates,
    /// which are dropped without touching the buffer.
    pub fn apply_remote(&mut self, text: &str, language: &str, origin: &str) -> bool {
        if origin == self.origin {
            return false;
        }
        self.document = CodeDocument { text: text.to_owned(), language: language.to_owned() };
        // The remote state supersedes whatever edit was pending.
        self.debounce.cancel();
        self.cooldown.arm();
        true
    }

    /// Hydrate from a join snapshot. No cooldown: the snapshot arrives
    /// before any editor exists to fire change callbacks.
    pub fn hydrate(&mut self, document: CodeDocument) {
        self.document = document;
        self.debounce.cancel();
    }
}

const PYTHON_TEMPLATE: &str = r#"# Welcome to CollabCode Canvas!
def fibonacci(n):
    if n <= 1:
        return n
    return fibonacci(n - 1) + fibonacci(n - 2)

print("Fibonacci sequence:")
for i in range(10):
    print(f"F({i}) = {fibonacci(i)}")"#;

const JAVASCRIPT_TEMPLATE: &str = r#"// Welcome to CollabCode Canvas!
function fibonacci(n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

console.log("Fibonacci sequence:");
for (let i = 0; i < 10; i++) {
    console.log(`F(${i}) = ${fibonacci(i)}`);
}"#;

const CPP_TEMPLATE: &str = r#"// Welcome to CollabCode Canvas!
#include <iostream>
using namespace std;

int fibonacci(int n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

int main() {
    cout << "Fibonacci sequence:" << endl;
    for (int i = 0; i < 10; i++) {
        cout << "F(" << i << ") = " << fibonacci(i) << endl;
    }
    return 0;
}"#;

const JAVA_TEMPLATE: &str = r#"// Welcome to CollabCode Canvas!
public class Main {
    public static int fibonacci(int n) {
        if (n <= 1) return n;
        return fibonacci(n - 1) + fibonacci(n - 2);
    }

    public static void main(String[] args) {
        System.out.println("Fibonacci sequence:");
        for (int i = 0; i < 10; i++) {
            System.out.println("F(" + i + ") = " + fibonacci(i));
        }
    }
}"#;

const C_TEMPLATE: &str = r#"// Welcome to CollabCode Canvas!
#include <stdio.h>

int fibonacci(int n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

int main() {
    printf("Fibonacci sequence:\n");
    for (int i = 0; i < 10; i++) {
        printf("F(%d) = %d\n", i, fibonacci(i));
    }
    return 0;
}"#;

#[cfg(test)]
#[path = "code_test.rs"]
mod tests;
