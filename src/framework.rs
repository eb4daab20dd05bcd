// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Framework classification.
//!
//! Every repository checkout is classified into exactly one [`Framework`]
//! before its build recipe is generated. The user may name the framework
//! explicitly. Otherwise the framework is detected from the dependencies
//! listed in the repository's `package.json` manifest.
//!
//! # Detection Precedence
//!
//! First match wins:
//!
//! 1. Explicit framework supplied by caller.
//! 2. Server-side meta-framework dependency (`next`) → [`Framework::NextJs`].
//! 3. SPA build tool or scaffold dependency (`vite`, `react-scripts`) →
//!    [`Framework::Spa`].
//! 4. Backend framework dependency (`@nestjs/core`) → [`Framework::NestJs`].
//! 5. Manifest present but nothing matched → [`Framework::Node`].
//! 6. No manifest → [`Framework::Static`].

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::Path,
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Name of package manifest inspected during detection.
pub const MANIFEST_FILE: &str = "package.json";

/// Supported build frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Framework {
    /// Plain static files, no package manifest.
    Static,

    /// Single page application that is built then served as static files.
    Spa,

    /// Server-rendered Next.js application.
    NextJs,

    /// NestJS backend service.
    NestJs,

    /// Generic Node.js service started through `npm start`.
    Node,
}

impl Framework {
    /// Canonical tag of framework.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Static => "html",
            Self::Spa => "react",
            Self::NextJs => "nextjs",
            Self::NestJs => "nestjs",
            Self::Node => "nodejs",
        }
    }

    /// Resolve framework of repository checkout.
    ///
    /// Explicit framework always wins. Otherwise, detect it from the
    /// repository's package manifest.
    pub fn resolve(explicit: Option<Framework>, repo_dir: impl AsRef<Path>) -> Framework {
        match explicit {
            Some(framework) => {
                debug!("use explicit framework {framework}");
                framework
            }
            None => detect(repo_dir),
        }
    }
}

impl Display for Framework {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.tag())
    }
}

impl FromStr for Framework {
    type Err = UnknownFramework;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "html" => Ok(Self::Static),
            "react" => Ok(Self::Spa),
            "nextjs" => Ok(Self::NextJs),
            "nestjs" => Ok(Self::NestJs),
            "express" | "nodejs" => Ok(Self::Node),
            unknown => Err(UnknownFramework(unknown.into())),
        }
    }
}

impl TryFrom<String> for Framework {
    type Error = UnknownFramework;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<Framework> for String {
    fn from(framework: Framework) -> Self {
        framework.tag().into()
    }
}

/// Detect framework of repository checkout from its package manifest.
///
/// A manifest that cannot be parsed still counts as present, which classifies
/// the repository as a generic [`Framework::Node`] service.
#[instrument(skip(repo_dir), level = "debug")]
pub fn detect(repo_dir: impl AsRef<Path>) -> Framework {
    let manifest_path = repo_dir.as_ref().join(MANIFEST_FILE);
    let data = match read_to_string(&manifest_path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("no manifest at {:?}", manifest_path.display());
            return Framework::Static;
        }
        Err(err) => {
            warn!("cannot read {:?}: {err}", manifest_path.display());
            return Framework::Node;
        }
    };

    let manifest: Manifest = serde_json::from_str(&data).unwrap_or_else(|err| {
        warn!("malformed manifest {:?}: {err}", manifest_path.display());
        Manifest::default()
    });

    let framework = manifest.classify();
    debug!("detected framework {framework}");
    framework
}

/// Subset of `package.json` relevant to detection.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Manifest {
    pub dependencies: HashMap<String, String>,
    pub dev_dependencies: HashMap<String, String>,
}

impl Manifest {
    /// Classify manifest by detection precedence.
    pub fn classify(&self) -> Framework {
        if self.has_any_dependency("next") {
            Framework::NextJs
        } else if self.has_any_dependency("vite") || self.has_any_dependency("react-scripts") {
            Framework::Spa
        } else if self.has_dependency("@nestjs/core") {
            Framework::NestJs
        } else {
            Framework::Node
        }
    }

    /// Check runtime dependencies only.
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies
            .get(name)
            .is_some_and(|version| !version.is_empty())
    }

    /// Check runtime and development dependencies.
    pub fn has_any_dependency(&self, name: &str) -> bool {
        self.has_dependency(name)
            || self
                .dev_dependencies
                .get(name)
                .is_some_and(|version| !version.is_empty())
    }
}

/// Framework tag is not one dockhand knows how to build.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown framework {0:?}, expected one of html, react, nextjs, nestjs, express, nodejs")]
pub struct UnknownFramework(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::fs::write;

    #[test_case(r#"{"dependencies": {"next": "14.0.0", "react": "18.2.0"}}"#, Framework::NextJs; "next dependency")]
    #[test_case(r#"{"devDependencies": {"next": "14.0.0"}}"#, Framework::NextJs; "next dev dependency")]
    #[test_case(r#"{"devDependencies": {"vite": "5.0.0"}}"#, Framework::Spa; "vite scaffold")]
    #[test_case(r#"{"dependencies": {"react-scripts": "5.0.1"}}"#, Framework::Spa; "create react app")]
    #[test_case(r#"{"dependencies": {"@nestjs/core": "10.0.0"}}"#, Framework::NestJs; "nest backend")]
    #[test_case(r#"{"devDependencies": {"@nestjs/core": "10.0.0"}}"#, Framework::Node; "nest only in dev")]
    #[test_case(r#"{"dependencies": {"express": "4.18.2"}}"#, Framework::Node; "plain express")]
    #[test_case(r#"{"dependencies": {"next": "14.0.0", "@nestjs/core": "10.0.0", "vite": "5.0.0"}}"#, Framework::NextJs; "meta framework beats everything")]
    #[test_case(r#"{"dependencies": {"@nestjs/core": "10.0.0", "vite": "5.0.0"}}"#, Framework::Spa; "spa beats backend")]
    #[test_case(r#"{"dependencies": {"next": ""}}"#, Framework::Node; "empty version ignored")]
    #[test_case("this is not json", Framework::Node; "malformed manifest")]
    #[test]
    fn detect_from_manifest(manifest: &str, expect: Framework) {
        let repo = tempfile::tempdir().unwrap();
        write(repo.path().join(MANIFEST_FILE), manifest).unwrap();
        assert_eq!(detect(repo.path()), expect);
    }

    #[test]
    fn detect_without_manifest_is_static() -> anyhow::Result<()> {
        let repo = tempfile::tempdir()?;
        write(repo.path().join("index.html"), "<h1>hi</h1>")?;
        assert_eq!(detect(repo.path()), Framework::Static);

        Ok(())
    }

    #[test]
    fn explicit_framework_overrides_detection() -> anyhow::Result<()> {
        let repo = tempfile::tempdir()?;
        write(
            repo.path().join(MANIFEST_FILE),
            r#"{"dependencies": {"next": "14.0.0"}}"#,
        )?;
        assert_eq!(
            Framework::resolve(Some(Framework::Static), repo.path()),
            Framework::Static
        );
        assert_eq!(Framework::resolve(None, repo.path()), Framework::NextJs);

        Ok(())
    }

    #[test_case("html", Framework::Static; "html tag")]
    #[test_case("react", Framework::Spa; "react tag")]
    #[test_case("nextjs", Framework::NextJs; "nextjs tag")]
    #[test_case("nestjs", Framework::NestJs; "nestjs tag")]
    #[test_case("express", Framework::Node; "express tag")]
    #[test_case("nodejs", Framework::Node; "nodejs tag")]
    #[test]
    fn parse_framework_tags(tag: &str, expect: Framework) {
        assert_eq!(tag.parse::<Framework>().unwrap(), expect);
    }

    #[test]
    fn reject_unknown_framework_tag() {
        assert!("django".parse::<Framework>().is_err());
        assert!("".parse::<Framework>().is_err());
    }
}
