//! The command registry the binary dispatches through.

use crate::CliError;

/// Runner signature of one sub-command: the argument list excludes the
/// binary name and the command word.
pub type CommandRunner = fn(&[String]) -> Result<(), CliError>;

/// One registered sub-command.
pub struct CommandEntry {
    pub name: &'static str,
    pub about: &'static str,
    pub runner: CommandRunner,
}

/// All sub-commands of one binary invocation.
///
/// The registry is a plain value constructed once in `main` and passed to
/// the dispatcher, so there is no global command table to mutate.
pub struct CommandRegistry {
    commands: Vec<CommandEntry>,
}

impl CommandRegistry {
    pub fn new(commands: Vec<CommandEntry>) -> CommandRegistry {
        CommandRegistry { commands }
    }

    pub fn commands(&self) -> &[CommandEntry] { &self.commands }

    /// Finds a command by its exact name.
    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// The registered command closest to a mistyped name, for the
    /// "did you mean" hint.
    pub fn suggest(&self, name: &str) -> Option<&CommandEntry> {
        self.commands
            .iter()
            .map(|c| (edit_distance(name, c.name), c))
            .filter(|(d, _)| *d <= 3)
            .min_by_key(|(d, _)| *d)
            .map(|(_, c)| c)
    }

    /// One line per command, for the usage screen.
    pub fn usage(&self) -> String {
        let mut out = String::new();
        for c in &self.commands {
            out.push_str(&format!("  {:<18}{}\n", c.name, c.about));
        }
        out
    }
}

/// Plain Levenshtein distance over ASCII command names.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<u8> = a.bytes().collect();
    let b: Vec<u8> = b.bytes().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_args: &[String]) -> Result<(), CliError> { Ok(()) }

    #[test]
    fn suggests_the_nearest_command() {
        let registry = CommandRegistry::new(vec![
            CommandEntry { name: "kmermatcher", about: "", runner: noop },
            CommandEntry { name: "kmersearch", about: "", runner: noop },
            CommandEntry { name: "countkmer", about: "", runner: noop },
        ]);
        assert_eq!(registry.suggest("kmermacher").unwrap().name, "kmermatcher");
        assert_eq!(registry.suggest("kmersarch").unwrap().name, "kmersearch");
        assert!(registry.suggest("wholly-unrelated").is_none());
        assert!(registry.get("countkmer").is_some());
    }
}
