//! Fetches Maven artifacts by shelling out to `mvn`.
//!
//! There is no Maven resolver here: we generate a throwaway project whose
//! only dependency is the wanted artifact and let
//! `mvn dependency:copy-dependencies` do the work.

use std::fs;
use std::path::Path;

use log::{debug, info, log_enabled, Level};

use crate::common::shell::{LocalShell, ShellCmd};

/// Coordinates of a single Maven artifact.
#[derive(Debug)]
pub struct MavenArtifact<'a> {
    pub group_id: &'a str,
    pub artifact_id: &'a str,
    pub version: &'a str,
    /// Classifier, e.g. `release`.
    pub classifier: &'a str,
    /// Packaging type, e.g. `jar` or `tar.gz`.
    pub packaging: &'a str,
}

impl std::fmt::Display for MavenArtifact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.version, self.classifier, self.packaging
        )
    }
}

/// `pom.xml` for a project depending on exactly one externally specified
/// artifact. Upper-case tokens are substituted before writing the file.
const POM_XML_TEMPLATE: &str = r#"
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0
                             http://maven.apache.org/maven-v4_0_0.xsd">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.kiji</groupId>
  <artifactId>maven-fetcher</artifactId>
  <version>0.0.0</version>
  <packaging>jar</packaging>

  <dependencies>
    <dependency>
      <groupId>GROUP_ID</groupId>
      <artifactId>ARTIFACT_ID</artifactId>
      <version>VERSION</version>
      <classifier>CLASSIFIER</classifier>
      <type>PACKAGING</type>
      <scope>runtime</scope>
    </dependency>
  </dependencies>

  <repositories>
    REMOTE_REPO
  </repositories>
</project>
"#;

fn render_pom(artifact: &MavenArtifact<'_>, remote_repo: Option<&str>) -> String {
    let remote_repo = match remote_repo {
        Some(url) => format!(
            "<repository> <id>remote_repo</id> <url>{}</url> </repository>",
            url
        ),
        None => String::new(),
    };

    POM_XML_TEMPLATE
        .replace("GROUP_ID", artifact.group_id)
        .replace("ARTIFACT_ID", artifact.artifact_id)
        .replace("VERSION", artifact.version)
        .replace("CLASSIFIER", artifact.classifier)
        .replace("PACKAGING", artifact.packaging)
        .replace("REMOTE_REPO", &remote_repo)
}

/// Fetch `artifact` into `output_dir`, consulting the optional local and
/// remote repositories. Aborts the run with an error naming the artifact if
/// `mvn` fails.
pub fn fetch_artifact(
    shell: &LocalShell,
    artifact: &MavenArtifact<'_>,
    transitive: bool,
    output_dir: &Path,
    local_repo: Option<&str>,
    remote_repo: Option<&str>,
) -> Result<(), failure::Error> {
    let scratch = tempfile::Builder::new().prefix("maven-fetcher.").tempdir()?;
    debug!("Maven fetch working directory is {:?}", scratch.path());

    let pom = render_pom(artifact, remote_repo);
    debug!("Writing pom.xml file:\n{}", pom);
    fs::write(scratch.path().join("pom.xml"), pom)?;

    info!("Fetching Maven artifact {}", artifact);

    let mut argv = vec![
        "mvn".to_owned(),
        "dependency:copy-dependencies".to_owned(),
        format!("-DoutputDirectory={}", output_dir.display()),
        format!("-DexcludeTransitive={}", !transitive),
        "-U".to_owned(),
    ];
    if let Some(local_repo) = local_repo {
        argv.push(format!("-Dmaven.repo.local={}", local_repo));
    }
    if !log_enabled!(Level::Debug) {
        argv.push("--quiet".to_owned());
    }

    let fetch = shell.run(ShellCmd::args(argv).cwd(scratch.path()))?;
    if fetch.status != 0 {
        return Err(failure::format_err!(
            "Error fetching artifact: {}",
            artifact
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{render_pom, MavenArtifact};

    fn bento_artifact() -> MavenArtifact<'static> {
        MavenArtifact {
            group_id: "org.kiji.kiji-bento",
            artifact_id: "kiji-bento",
            version: "1.0.0-rc5",
            classifier: "release",
            packaging: "tar.gz",
        }
    }

    #[test]
    fn the_pom_names_the_requested_artifact() {
        let pom = render_pom(&bento_artifact(), None);

        assert!(pom.contains("<groupId>org.kiji.kiji-bento</groupId>"));
        assert!(pom.contains("<artifactId>kiji-bento</artifactId>"));
        assert!(pom.contains("<version>1.0.0-rc5</version>"));
        assert!(pom.contains("<classifier>release</classifier>"));
        assert!(pom.contains("<type>tar.gz</type>"));
    }

    #[test]
    fn a_remote_repo_adds_a_repository_stanza() {
        let pom = render_pom(&bento_artifact(), Some("https://repo.example.com/all"));

        assert!(pom.contains("<url>https://repo.example.com/all</url>"));
    }

    #[test]
    fn no_remote_repo_leaves_the_repositories_empty() {
        let pom = render_pom(&bento_artifact(), None);

        assert!(!pom.contains("<repository>"));
    }

    #[test]
    fn artifacts_display_as_full_maven_ids() {
        assert_eq!(
            bento_artifact().to_string(),
            "org.kiji.kiji-bento:kiji-bento:1.0.0-rc5:release:tar.gz"
        );
    }
}
