use crate::script::{ScriptBuilder, ScriptError};
use serde::Serialize;
use std::fmt;

const GET_PIP_URL: &str =
    "https://github.com/pypa/get-pip/raw/6ce3639da143c5d79b44f94b04080abf2531fd6e/public/get-pip.py";
const GET_PIP_SHA256: &str = "ba3ab8267d91fd41c58dbce08f76db99f747f716d85ce1865813842bb035524d";
const JILL_URL: &str = "https://raw.githubusercontent.com/abelsiqueira/jill/main/jill.sh";
const HOMEBREW_INSTALL_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// Packages installed by a fixed bootstrap procedure instead of a plain
/// package-manager call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialPackage {
    Python,
    Julia,
    Homebrew,
}

impl SpecialPackage {
    pub const ALL: [Self; 3] = [Self::Python, Self::Julia, Self::Homebrew];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Julia => "julia",
            Self::Homebrew => "homebrew",
        }
    }

    /// Plain packages the bootstrap needs installed first.
    pub fn dependencies(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["python3", "python3-distutils"],
            Self::Julia => &["curl", "sudo"],
            Self::Homebrew => &["curl", "git", "sudo"],
        }
    }

    pub fn bootstrap(self, script: &mut ScriptBuilder) -> Result<(), ScriptError> {
        match self {
            Self::Python => bootstrap_python(script),
            Self::Julia => bootstrap_julia(script),
            Self::Homebrew => bootstrap_homebrew(script),
        }
    }
}

impl fmt::Display for SpecialPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn bootstrap_python(script: &mut ScriptBuilder) -> Result<(), ScriptError> {
    script.comment("setting up pip")?.run([
        format!("wget -O get-pip.py {GET_PIP_URL}"),
        format!("echo \"{GET_PIP_SHA256} *get-pip.py\" | sha256sum -c -"),
        "python3 get-pip.py --no-cache-dir --no-compile".to_owned(),
        "rm -f get-pip.py".to_owned(),
        "echo \"alias python=python3\" >> $HOME/.bashrc".to_owned(),
        "pip --version".to_owned(),
    ])?;
    Ok(())
}

fn bootstrap_julia(script: &mut ScriptBuilder) -> Result<(), ScriptError> {
    script.comment("installing julia")?.run([format!(
        "sudo bash -ci \"$(curl -fsSL {JILL_URL})\" --yes --no-confirm"
    )])?;
    Ok(())
}

fn bootstrap_homebrew(script: &mut ScriptBuilder) -> Result<(), ScriptError> {
    script
        .comment("installing homebrew")?
        .run([
            format!("sudo NONINTERACTIVE=1 /bin/bash -c \"$(curl -fsSL {HOMEBREW_INSTALL_URL})\""),
            "chown -R $USER /home/linuxbrew/".to_owned(),
        ])?
        .env("PATH", "/home/linuxbrew/.linuxbrew/bin:$PATH")?;
    Ok(())
}
