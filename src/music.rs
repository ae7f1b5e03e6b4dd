//! Runs the KijiMusic tutorial end to end: install an instance, import the
//! sample data, and run the play-count jobs, checking every command's output
//! along the way.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::clap_app;
use log::{debug, info};
use serde::Serialize;

use crate::common::bento::BentoCluster;
use crate::common::check;
use crate::common::env;
use crate::common::maven::{self, MavenArtifact};
use crate::common::shell::{CmdResult, LocalShell};
use crate::common::{extract_archive, now_ms, truth};

/// Everything the run was configured with on the command line. Built once
/// from the parsed flags and passed around by reference.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub work_dir: Option<PathBuf>,
    pub maven_local_repo: Option<String>,
    pub maven_remote_repo: Option<String>,
    pub bento_version: String,
    pub disable_cleanup: bool,
    pub log_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_matches(matches: &clap::ArgMatches<'_>) -> Result<RunConfig, failure::Error> {
        // A bare --disable_cleanup means "true"; with a value, the value
        // decides.
        let disable_cleanup = if matches.is_present("DISABLE_CLEANUP") {
            match matches.value_of("DISABLE_CLEANUP") {
                Some(value) => truth(value)?,
                None => true,
            }
        } else {
            false
        };

        Ok(RunConfig {
            work_dir: matches.value_of("WORK_DIR").map(PathBuf::from),
            maven_local_repo: matches.value_of("MAVEN_LOCAL_REPO").map(String::from),
            maven_remote_repo: matches.value_of("MAVEN_REMOTE_REPO").map(String::from),
            bento_version: matches.value_of("BENTO_VERSION").unwrap().to_owned(),
            disable_cleanup,
            log_dir: matches.value_of("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Settings recorded next to the command logs so a run can be identified
/// after the fact.
#[derive(Serialize)]
struct RunParams<'a> {
    run_id: i64,
    work_dir: &'a Path,
    config: &'a RunConfig,
}

pub fn cli_options() -> clap::App<'static, 'static> {
    fn is_truth(s: String) -> Result<(), String> {
        crate::common::truth(&s).map(|_| ()).map_err(|e| e.to_string())
    }

    fn is_log_level(s: String) -> Result<(), String> {
        crate::common::parse_log_level(&s)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    clap_app! { music_tutorial =>
        (about: "Runs the KijiMusic tutorial against a freshly fetched KijiBento release.")
        (@arg WORK_DIR: --work_dir +takes_value
         "Working directory. Defaults to a fresh work-dir.* directory under \
          the current directory.")
        (@arg MAVEN_LOCAL_REPO: --maven_local_repo +takes_value
         "Optional Maven local repository from where to fetch artifacts.")
        (@arg MAVEN_REMOTE_REPO: --maven_remote_repo +takes_value
         "Optional Maven remote repository from where to fetch artifacts.")
        (@arg BENTO_VERSION: --bento_version +required +takes_value
         "Version of KijiBento to download and test against, \
          e.g. 1.0.0-rc4 or 1.0.0-rc5-SNAPSHOT.")
        (@arg DISABLE_CLEANUP: --disable_cleanup #{0, 1} {is_truth}
         "When set, disables cleaning up after the run: the Bento cluster \
          stays alive and the working directory is kept for inspection. \
          Accepts yes/no/true/false; bare flag means true.")
        (@arg LOG_DIR: --log_dir +takes_value
         "Directory for per-command output logs. Defaults to the working \
          directory.")
        (@arg LOG_LEVEL: --log_level +takes_value {is_log_level}
         "Log level, as a name (info, debug, ...) or a numeric filter \
          (0 = off .. 5 = trace).")
    }
}

pub fn run(matches: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let cfg = RunConfig::from_matches(matches)?;

    let cwd = std::env::current_dir()?;
    let work_dir = match &cfg.work_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.canonicalize()?
        }
        None => tempfile::Builder::new()
            .prefix("work-dir.")
            .tempdir_in(&cwd)?
            .into_path(),
    };
    debug!("Working directory: {:?}", work_dir);

    let log_dir = match &cfg.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.canonicalize()?
        }
        None => work_dir.clone(),
    };
    debug!("Log directory: {:?}", log_dir);

    info!("Testing tutorial of KijiBento {}", cfg.bento_version);

    let mut timers = vec![];

    let tutorial = time!(timers, "setup", Tutorial::setup(&cfg, &work_dir, &log_dir)?);
    time!(timers, "part1", tutorial.part1()?);
    time!(timers, "part2", tutorial.part2()?);
    time!(timers, "part3", tutorial.part3()?);
    time!(timers, "part4", tutorial.part4()?);

    if cfg.disable_cleanup {
        info!(
            "Cleanup disabled: the Bento cluster stays alive and {:?} is kept.",
            work_dir
        );
    } else {
        time!(timers, "cleanup", tutorial.cleanup()?);
    }

    for (label, duration) in timers {
        info!("{}: {:?}", label, duration);
    }

    Ok(())
}

/// A fully set-up tutorial run: distribution unpacked, cluster running,
/// environment composed. Read by every phase, consumed by `cleanup`.
pub struct Tutorial {
    work_dir: PathBuf,
    bento_dir: PathBuf,
    cluster: BentoCluster,
    /// Shell with the ambient environment, for plumbing (mvn, tar, kill).
    plain: LocalShell,
    /// Shell with the composed tutorial environment, for kiji commands.
    shell: LocalShell,
}

impl Tutorial {
    /// Fetch the KijiBento release if it is not cached in the working
    /// directory, unpack it, start a Bento cluster, and compose the
    /// environment all tutorial commands run under.
    pub fn setup(
        cfg: &RunConfig,
        work_dir: &Path,
        log_dir: &Path,
    ) -> Result<Tutorial, failure::Error> {
        let run_id = now_ms();
        let plain = LocalShell::new(log_dir);

        let archive = work_dir.join(format!("kiji-bento-{}-release.tar.gz", cfg.bento_version));
        if !archive.exists() {
            maven::fetch_artifact(
                &plain,
                &MavenArtifact {
                    group_id: "org.kiji.kiji-bento",
                    artifact_id: "kiji-bento",
                    version: &cfg.bento_version,
                    classifier: "release",
                    packaging: "tar.gz",
                },
                false,
                work_dir,
                cfg.maven_local_repo.as_ref().map(String::as_str),
                cfg.maven_remote_repo.as_ref().map(String::as_str),
            )?;
        }

        // The release archive wraps everything in a "kiji-bento-<code-name>/"
        // directory and the code name is unknown here, so extract with the
        // first path component stripped.
        let bento_dir = work_dir.join(format!("kiji-bento-{}", cfg.bento_version));
        if !bento_dir.exists() {
            fs::create_dir_all(&bento_dir)?;
            extract_archive(&plain, &archive, &bento_dir, 1)?;
        }

        let cluster_dir = bento_dir.join("cluster");
        if !cluster_dir.exists() {
            return Err(failure::format_err!(
                "BentoCluster root directory not found: {:?}",
                cluster_dir
            ));
        }
        let music_dir = bento_dir.join("examples").join("music");
        if !music_dir.exists() {
            return Err(failure::format_err!(
                "KijiMusic root directory not found: {:?}",
                music_dir
            ));
        }

        let mut cluster = BentoCluster::new(cluster_dir)?;
        cluster.start(&plain)?;

        let lib_dir = music_dir.join("lib");

        let mut overrides = BTreeMap::new();
        overrides.insert("MUSIC_HOME".to_owned(), music_dir.display().to_string());
        overrides.insert("LIBS_DIR".to_owned(), lib_dir.display().to_string());
        overrides.insert(
            "KIJI".to_owned(),
            format!("kiji://.env/kiji_music_{}", run_id),
        );
        overrides.insert("KIJI_CLASSPATH".to_owned(), env::classpath(&lib_dir)?);
        overrides.insert("HDFS_BASE".to_owned(), format!("kiji-music-{}", run_id));

        let shell = LocalShell::with_env(log_dir, env::compose(&overrides));

        fs::write(
            log_dir.join("run.params"),
            serde_json::to_string_pretty(&RunParams {
                run_id,
                work_dir,
                config: cfg,
            })?,
        )?;

        Ok(Tutorial {
            work_dir: work_dir.to_path_buf(),
            bento_dir,
            cluster,
            plain,
            shell,
        })
    }

    /// Run a kiji command line with the KijiBento environment sourced, the
    /// bento root as cwd, and the composed tutorial environment.
    fn kiji(&self, command: &str) -> Result<CmdResult, failure::Error> {
        self.shell.run(
            cmd!("source ./bin/kiji-env.sh > /dev/null 2>&1 && {}", command)
                .cwd(&self.bento_dir),
        )
    }

    /// Tutorial setup: install an instance, create the tables, generate the
    /// sample data, and copy it into HDFS.
    pub fn part1(&self) -> Result<(), failure::Error> {
        let install = self.kiji("kiji install --kiji=${KIJI}")?;
        check::expect_zero(&install)?;
        check::expect_contains(&install.stdout, "Successfully created kiji instance: ")?;

        let create_table =
            self.kiji("kiji-schema-shell --kiji=${KIJI} --file=${MUSIC_HOME}/music_schema.ddl")?;
        check::expect_zero(&create_table)?;

        let generate_data = self.kiji(
            "rm -f ${MUSIC_HOME}/example_data/* && \
             ${MUSIC_HOME}/bin/data_generator.py --output-dir=${MUSIC_HOME}/example_data/",
        )?;
        check::expect_zero(&generate_data)?;

        let mkdir = self.kiji("hadoop fs -mkdir ${HDFS_BASE}/kiji-mr-tutorial/")?;
        check::expect_zero(&mkdir)?;

        let copy = self.kiji(
            "hadoop fs -copyFromLocal \
             ${MUSIC_HOME}/example_data/*.json ${HDFS_BASE}/kiji-mr-tutorial/",
        )?;
        check::expect_zero(&copy)?;

        let list_tables = self.kiji("kiji ls ${KIJI}")?;
        check::expect_zero(&list_tables)?;
        check::expect_contains(&list_tables.stdout, "songs")?;
        check::expect_contains(&list_tables.stdout, "users")?;

        Ok(())
    }

    /// Bulk-import the song metadata and the play logs.
    pub fn part2(&self) -> Result<(), failure::Error> {
        let bulk_import = self.kiji(
            "kiji bulk-import \
             --importer=org.kiji.examples.music.bulkimport.SongMetadataBulkImporter \
             --lib=${LIBS_DIR} \
             --input=\"format=text file=${HDFS_BASE}/kiji-mr-tutorial/song-metadata.json\" \
             --output=\"format=kiji table=${KIJI}/songs nsplits=1\"",
        )?;
        check::expect_zero(&bulk_import)?;
        // The bulk-import tool writes its progress to stderr only.
        check::expect_contains(&bulk_import.stderr, "Total input paths to process : 1")?;
        check::expect_contains(&bulk_import.stderr, "BULKIMPORTER_RECORDS_PROCESSED=50")?;

        let list_rows = self.kiji("kiji scan ${KIJI}/songs --max-rows=3")?;
        check::expect_zero(&list_rows)?;

        // Import the play logs through a table import descriptor.
        let copy = self.kiji(
            "hadoop fs -copyFromLocal \
             ${MUSIC_HOME}/import/song-plays-import-descriptor.json \
             ${HDFS_BASE}/kiji-mr-tutorial/",
        )?;
        check::expect_zero(&copy)?;

        let bulk_import = self.kiji(
            "kiji bulk-import \
             -Dkiji.import.text.input.descriptor.path=\
             ${HDFS_BASE}/kiji-mr-tutorial/song-plays-import-descriptor.json \
             --importer=org.kiji.mapreduce.lib.bulkimport.JSONBulkImporter \
             --input=\"format=text file=${HDFS_BASE}/kiji-mr-tutorial/song-plays.json\" \
             --output=\"format=kiji table=${KIJI}/users nsplits=1\" \
             --lib=${LIBS_DIR}",
        )?;
        check::expect_zero(&bulk_import)?;
        check::expect_contains(&bulk_import.stderr, "Total input paths to process : 1")?;
        // The number of generated play records changes from run to run, so
        // only the counter prefix is pinned here.
        check::expect_contains(&bulk_import.stderr, "BULKIMPORTER_RECORDS_PROCESSED=")?;

        let list_rows = self.kiji("kiji scan ${KIJI}/users --max-rows=3")?;
        check::expect_zero(&list_rows)?;
        let lines = list_rows.stdout_lines();
        check::expect_starts_with("Scanning kiji table: kiji://", lines[0])?;
        if lines.len() < 3 * 3 + 1 {
            return Err(failure::format_err!(
                "Truncated scan output: {} lines",
                lines.len()
            ));
        }
        for row in 0..3 {
            check::expect_regex_match(
                r"^entity-id=\['user-\d+'\] \[\d+\] info:track_plays$",
                lines[1 + row * 3],
            )?;
            check::expect_regex_match(r"^\s*song-\d+$", lines[2 + row * 3])?;
            check::expect_regex_match(r"^$", lines[3 + row * 3])?;
        }

        Ok(())
    }

    /// Play count: gather over the users table, sum with the stock reducer,
    /// and check the text output.
    pub fn part3(&self) -> Result<(), failure::Error> {
        let gather = self.kiji(
            "kiji gather \
             --gatherer=org.kiji.examples.music.gather.SongPlayCounter \
             --reducer=org.kiji.mapreduce.lib.reduce.LongSumReducer \
             --input=\"format=kiji table=${KIJI}/users\" \
             --output=\"format=text file=${HDFS_BASE}/output.txt_file nsplits=2\" \
             --lib=${LIBS_DIR}",
        )?;
        check::expect_zero(&gather)?;

        self.check_play_counts()
    }

    /// Sequential play count: the avrokv variant of the same job.
    pub fn part4(&self) -> Result<(), failure::Error> {
        let gather = self.kiji(
            "kiji gather \
             --gatherer=org.kiji.examples.music.gather.SequentialPlayCounter \
             --reducer=org.kiji.examples.music.reduce.SequentialPlayCountReducer \
             --input=\"format=kiji table=${KIJI}/users\" \
             --output=\"format=avrokv file=${HDFS_BASE}/output.sequentialPlayCount nsplits=2\" \
             --lib=${LIBS_DIR}",
        )?;
        check::expect_zero(&gather)?;

        self.check_play_counts()
    }

    /// Read back the first reducer partition of the play-count output and
    /// check its shape: three `song-N<TAB>count` lines.
    fn check_play_counts(&self) -> Result<(), failure::Error> {
        let fs_text =
            self.kiji("hadoop fs -text ${HDFS_BASE}/output.txt_file/part-r-00000 | head -3")?;
        check::expect_zero(&fs_text)?;

        let lines: Vec<&str> = fs_text
            .stdout_lines()
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect();
        check::expect_eq(3, lines.len())?;
        for line in lines {
            check::expect_regex_match(r"^song-\d+\t\d+$", line)?;
        }

        Ok(())
    }

    /// Stop the cluster and wipe the working directory.
    pub fn cleanup(mut self) -> Result<(), failure::Error> {
        self.cluster.stop(&self.plain)?;
        fs::remove_dir_all(&self.work_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{cli_options, RunConfig};

    fn matches_for(args: Vec<&str>) -> clap::ArgMatches<'static> {
        cli_options().get_matches_from_safe(args).unwrap()
    }

    #[test]
    fn the_version_flag_is_required() {
        let err = cli_options()
            .get_matches_from_safe(vec!["music_tutorial"])
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = cli_options()
            .get_matches_from_safe(vec![
                "music_tutorial",
                "--bento_version",
                "1.0.0-rc5",
                "--frobnicate",
            ])
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::UnknownArgument);
    }

    #[test]
    fn cleanup_defaults_to_enabled() {
        let matches = matches_for(vec!["music_tutorial", "--bento_version", "1.0.0-rc5"]);
        let cfg = RunConfig::from_matches(&matches).unwrap();
        assert!(!cfg.disable_cleanup);
    }

    #[test]
    fn a_bare_disable_cleanup_flag_means_true() {
        let matches = matches_for(vec![
            "music_tutorial",
            "--bento_version",
            "1.0.0-rc5",
            "--disable_cleanup",
        ]);
        let cfg = RunConfig::from_matches(&matches).unwrap();
        assert!(cfg.disable_cleanup);
    }

    #[test]
    fn disable_cleanup_accepts_truth_values() {
        let matches = matches_for(vec![
            "music_tutorial",
            "--bento_version",
            "1.0.0-rc5",
            "--disable_cleanup",
            "YES",
        ]);
        assert!(RunConfig::from_matches(&matches).unwrap().disable_cleanup);

        let matches = matches_for(vec![
            "music_tutorial",
            "--bento_version",
            "1.0.0-rc5",
            "--disable_cleanup",
            "no",
        ]);
        assert!(!RunConfig::from_matches(&matches).unwrap().disable_cleanup);
    }

    #[test]
    fn a_bad_truth_value_is_a_usage_error() {
        let err = cli_options()
            .get_matches_from_safe(vec![
                "music_tutorial",
                "--bento_version",
                "1.0.0-rc5",
                "--disable_cleanup",
                "maybe",
            ])
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::ValueValidation);
    }

    #[test]
    fn a_bad_log_level_is_a_usage_error() {
        let err = cli_options()
            .get_matches_from_safe(vec![
                "music_tutorial",
                "--bento_version",
                "1.0.0-rc5",
                "--log_level",
                "loud",
            ])
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::ValueValidation);
    }

    #[test]
    fn all_flags_land_in_the_config() {
        let matches = matches_for(vec![
            "music_tutorial",
            "--work_dir",
            "/tmp/kiji-work",
            "--maven_local_repo",
            "/tmp/m2",
            "--maven_remote_repo",
            "https://repo.example.com/all",
            "--bento_version",
            "1.0.0-rc5",
            "--log_dir",
            "/tmp/kiji-logs",
        ]);
        let cfg = RunConfig::from_matches(&matches).unwrap();

        assert_eq!(cfg.work_dir.as_deref(), Some(std::path::Path::new("/tmp/kiji-work")));
        assert_eq!(cfg.maven_local_repo.as_deref(), Some("/tmp/m2"));
        assert_eq!(
            cfg.maven_remote_repo.as_deref(),
            Some("https://repo.example.com/all")
        );
        assert_eq!(cfg.bento_version, "1.0.0-rc5");
        assert_eq!(cfg.log_dir.as_deref(), Some(std::path::Path::new("/tmp/kiji-logs")));
    }
}
