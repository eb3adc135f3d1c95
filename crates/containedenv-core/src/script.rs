//! Layered provisioning script (Dockerfile) synthesis.
//!
//! `ScriptBuilder` is a structural accumulator: it records instructions in
//! order and never inspects command text. Once sealed, it refuses further
//! instructions. `ScriptFile` scopes the on-disk copy handed to the runtime.

use std::fmt;
use std::io::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("provisioning script is sealed; cannot append {0}")]
    Sealed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    From(String),
    User(String),
    Env { key: String, value: String },
    /// Lines executed as one layer in one shell.
    Run(Vec<String>),
    Comment(String),
    /// Emitted verbatim.
    Line(String),
}

impl Instruction {
    fn kind(&self) -> &'static str {
        match self {
            Self::From(_) => "FROM",
            Self::User(_) => "USER",
            Self::Env { .. } => "ENV",
            Self::Run(_) => "RUN",
            Self::Comment(_) => "comment",
            Self::Line(_) => "line",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From(image) => write!(f, "FROM {image}"),
            Self::User(user) => write!(f, "USER {user}"),
            Self::Env { key, value } => write!(f, "ENV {key}={value}"),
            Self::Run(lines) => write!(f, "RUN {}", lines.join(" && \\\n\t")),
            Self::Comment(text) => write!(f, "# {text}"),
            Self::Line(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptBuilder {
    instructions: Vec<Instruction>,
    sealed: bool,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, instruction: Instruction) -> Result<&mut Self, ScriptError> {
        if self.sealed {
            return Err(ScriptError::Sealed(instruction.kind()));
        }
        self.instructions.push(instruction);
        Ok(self)
    }

    pub fn from(&mut self, image: &str) -> Result<&mut Self, ScriptError> {
        self.push(Instruction::From(image.to_owned()))
    }

    pub fn user(&mut self, name: &str) -> Result<&mut Self, ScriptError> {
        self.push(Instruction::User(name.to_owned()))
    }

    pub fn env(&mut self, key: &str, value: &str) -> Result<&mut Self, ScriptError> {
        self.push(Instruction::Env {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }

    /// Append one `RUN` instruction for all `lines`. An empty list appends
    /// nothing.
    pub fn run<I, S>(&mut self, lines: I) -> Result<&mut Self, ScriptError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.sealed {
            return Err(ScriptError::Sealed("RUN"));
        }
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            return Ok(self);
        }
        self.push(Instruction::Run(lines))
    }

    pub fn comment(&mut self, text: &str) -> Result<&mut Self, ScriptError> {
        self.push(Instruction::Comment(text.to_owned()))
    }

    pub fn line(&mut self, text: &str) -> Result<&mut Self, ScriptError> {
        self.push(Instruction::Line(text.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Close the builder and hand out the finished script.
    pub fn seal(&mut self) -> Result<Script, ScriptError> {
        if self.sealed {
            return Err(ScriptError::Sealed("seal"));
        }
        self.sealed = true;
        Ok(Script {
            instructions: self.instructions.clone(),
        })
    }
}

/// A sealed, immutable provisioning script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    instructions: Vec<Instruction>,
}

impl Script {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

/// On-disk copy of a script, removed on `close` or drop.
pub struct ScriptFile {
    file: tempfile::NamedTempFile,
}

impl ScriptFile {
    pub fn create(dir: &Path, prefix: &str, script: &Script) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(dir)?;
        file.write_all(script.render().as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_instructions_in_order() {
        let mut b = ScriptBuilder::new();
        b.from("ubuntu:22.04")
            .unwrap()
            .user("root")
            .unwrap()
            .env("PATH", "/opt/bin:$PATH")
            .unwrap()
            .comment("tools")
            .unwrap()
            .run(["apt-get update -y"])
            .unwrap()
            .line("WORKDIR /projects")
            .unwrap();
        let script = b.seal().unwrap();
        assert_eq!(
            script.render(),
            "FROM ubuntu:22.04\nUSER root\nENV PATH=/opt/bin:$PATH\n# tools\nRUN apt-get update -y\nWORKDIR /projects\n"
        );
    }

    #[test]
    fn multi_line_run_is_a_single_instruction() {
        let mut b = ScriptBuilder::new();
        b.run(["cd /tmp", "export X=1", "echo $X"]).unwrap();
        let script = b.seal().unwrap();
        assert_eq!(script.instructions().len(), 1);
        assert_eq!(
            script.render(),
            "RUN cd /tmp && \\\n\texport X=1 && \\\n\techo $X\n"
        );
        assert_eq!(script.render().matches("RUN").count(), 1);
    }

    #[test]
    fn empty_run_appends_nothing() {
        let mut b = ScriptBuilder::new();
        b.run(Vec::<String>::new()).unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn emit_after_seal_fails() {
        let mut b = ScriptBuilder::new();
        b.from("alpine:3").unwrap();
        b.seal().unwrap();
        assert!(b.is_sealed());
        assert_eq!(b.user("root").unwrap_err(), ScriptError::Sealed("USER"));
        assert_eq!(b.run(["true"]).unwrap_err(), ScriptError::Sealed("RUN"));
        assert_eq!(b.run(Vec::<String>::new()).unwrap_err(), ScriptError::Sealed("RUN"));
        assert!(b.comment("x").is_err());
        assert!(b.line("x").is_err());
        assert!(b.env("A", "B").is_err());
        assert!(b.from("x").is_err());
        assert!(b.seal().is_err());
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn command_text_is_not_validated() {
        let mut b = ScriptBuilder::new();
        b.run(["", "&& ;; not a command"]).unwrap();
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn script_file_is_removed_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = ScriptBuilder::new();
        b.from("alpine:3").unwrap();
        let script = b.seal().unwrap();

        let file = ScriptFile::create(dir.path(), "Dockerfile.web.", &script).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "FROM alpine:3\n");
        file.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn script_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptBuilder::new().seal().unwrap();
        let path = {
            let file = ScriptFile::create(dir.path(), "Dockerfile.", &script).unwrap();
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
