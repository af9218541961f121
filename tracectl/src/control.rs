// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of log levels.

use ordermap::OrderMap;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::{display::TargetCfgDbByTag, targets::TRACING_TARGETS, trace_target};

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Errors in a `tag=level` configuration string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LogConfigError {
    #[error("invalid syntax '{0}': expected tag=level")]
    MissingLevel(String),
    #[error("invalid level '{level}' for '{tag}'")]
    BadLevel { tag: String, level: String },
}

#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
    pub(crate) custom: bool,
}

impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
        custom: bool,
    ) -> Self {
        // a target can always be addressed by its name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
            custom,
        }
    }
    /// The tracing target (module path for non-custom targets)
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
    /// The current level of the target
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
    /// Tells if the target was declared with an explicit name
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom
    }
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub(crate) tag: &'static str,
    pub(crate) targets: HashSet<&'static str>,
}

impl Tag {
    fn new(tag: &'static str, target: &'static str) -> Self {
        Self {
            tag,
            targets: HashSet::from([target]),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TargetCfgDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, Tag>,
}

impl TargetCfgDb {
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for target in TRACING_TARGETS {
            db.register(
                target.target,
                target.name,
                target.level,
                target.tags,
                target.custom,
            );
        }
        db
    }
    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
        custom: bool,
    ) {
        let tconfig = TargetCfg::new(target, name, level, tags, custom);
        let tags = tconfig.tags.clone();
        if let Some(exist) = self.targets.insert(target, tconfig) {
            warn!("Log target {} declared more than once", exist.target);
        }
        for tag in tags {
            self.tags
                .entry(tag)
                .and_modify(|t| {
                    t.targets.insert(target);
                })
                .or_insert_with(|| Tag::new(tag, target));
        }
    }
    fn env_filter(&self) -> EnvFilter {
        let mut f = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            match format!("{}={}", target.target, target.level).parse() {
                Ok(directive) => f = f.add_directive(directive),
                Err(e) => warn!("Skipping log target {}: {e}", target.target),
            }
        }
        f
    }
    fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.level);
        for target in self.targets.values() {
            out += format!(",{}={}", target.name, target.level).as_str();
        }
        out
    }
    fn tag_targets_mut(&mut self, tag: &str) -> impl Iterator<Item = &mut TargetCfg> {
        let members = self.tags.get(tag).map(|t| t.targets.clone()).unwrap_or_default();
        self.targets
            .values_mut()
            .filter(move |target| members.contains(target.target))
    }
    pub(crate) fn tag_targets(&self, tag: &str) -> impl Iterator<Item = &TargetCfg> {
        let members = self.tags.get(tag).map(|t| &t.targets);
        self.targets
            .values()
            .filter(move |target| members.is_some_and(|m| m.contains(target.target)))
    }
}

/// Owner of the log subscriber and of the per-target level database.
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetCfgDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetCfgDb::new(LevelFilter::INFO);
        let (filter, reload_filter) = reload::Layer::new(db.env_filter());

        // verification traces go to stderr so stdout stays usable for reports
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(false)
            .with_thread_names(false)
            .with_level(true);

        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            // tests may race to install a subscriber; keep the first one
            eprintln!("log subscriber already installed: {e}");
        }

        Self {
            db: Mutex::new(db),
            reload_filter,
        }
    }
    fn lock(&self) -> MutexGuard<'_, TargetCfgDb> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn reload(&self, db: &TargetCfgDb) {
        if let Err(e) = self.reload_filter.reload(db.env_filter()) {
            error!("Failed to reload log filter: {e}");
        }
    }
    #[cfg(test)]
    pub(crate) fn register(
        &self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
        custom: bool,
    ) {
        let mut db = self.lock();
        db.register(target, name, level, tags, custom);
        self.reload(&db);
    }
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    pub fn init() {
        get_trace_ctl();
    }
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) {
        let mut db = self.lock();
        let mut changed = 0;
        for target in db.tag_targets_mut(tag) {
            if target.level != level {
                target.level = level;
                changed += 1;
            }
        }
        if changed > 0 {
            self.reload(&db);
        }
        debug!("Log level for tag '{tag}' set to {level} ({changed} targets changed)");
    }
    pub fn set_level_all(&self, level: LevelFilter) {
        let mut db = self.lock();
        for target in db.targets.values_mut() {
            target.level = level;
        }
        self.reload(&db);
    }
    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.lock();
        if db.level != level {
            db.level = level;
            self.reload(&db);
        }
    }
    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.lock().level
    }

    /// Parse comma-separated `tag=level` items, where level is one of
    /// off, error, warn, info, debug, trace.
    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, LogConfigError> {
        let mut result = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let Some((tag, level)) = item.split_once('=') else {
                return Err(LogConfigError::MissingLevel(item.to_string()));
            };
            let level =
                LevelFilter::from_str(level.trim()).map_err(|_| LogConfigError::BadLevel {
                    tag: tag.trim().to_string(),
                    level: level.trim().to_string(),
                })?;
            result.insert(tag.trim().to_string(), level);
        }
        Ok(result)
    }

    /// Apply a `tag=level,...` configuration string.
    ///
    /// `default=` sets the level of untargeted events and `all=` sets every
    /// registered target; other items address tags and are applied last, so
    /// `default=error,all=info,filter=debug` behaves as expected.
    ///
    /// # Errors
    ///
    /// Returns a [`LogConfigError`] if the string is malformed; nothing is
    /// applied in that case.
    pub fn setup_from_string(&self, input: &str) -> Result<(), LogConfigError> {
        let config = Self::parse_config(input)?;
        if let Some(level) = config.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = config.get("all") {
            self.set_level_all(*level);
        }
        for (tag, level) in config.iter().filter(|(t, _)| *t != "default" && *t != "all") {
            self.set_tag_level(tag, *level);
        }
        Ok(())
    }

    pub fn get_tag(&self, tag: &str) -> Option<Tag> {
        self.lock().tags.get(tag).cloned()
    }
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.lock().targets.get(target).cloned()
    }
    pub fn get_targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        self.lock().tag_targets(tag).cloned().collect()
    }
    pub fn dump_targets_by_tag(&self) {
        let db = self.lock();
        info!("{}", TargetCfgDbByTag(&db));
    }
    pub fn dump(&self) {
        let db = self.lock();
        info!("{db}");
    }
    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.lock().as_config_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::control::{LogConfigError, TracingControl, get_trace_ctl};
    use crate::targets::TRACING_TARGETS;
    use crate::{LevelFilter, custom_target, trace_target};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_static_targets_are_collected() {
        trace_target!("tracectl-test", LevelFilter::ERROR, &[]);
        custom_target!("late-target", LevelFilter::OFF, &["late"]);

        let static_targets: Vec<&str> = TRACING_TARGETS.iter().map(|c| c.target).collect();
        assert!(static_targets.contains(&"late-target"));
        assert!(static_targets.contains(&"thread_cert_tracectl::control"));

        let tctl = get_trace_ctl();
        assert!(tctl.get_target("late-target").is_some());
        assert!(tctl.get_tag("late").is_some());
    }

    #[test]
    #[serial]
    fn test_change_tag_level() {
        const TAG: &str = "common-tag";
        custom_target!("t1", LevelFilter::DEBUG, &[TAG]);
        custom_target!("t2", LevelFilter::ERROR, &[TAG]);

        let tctl = get_trace_ctl();
        assert_eq!(tctl.get_targets_by_tag(TAG).len(), 2);
        tctl.set_tag_level(TAG, LevelFilter::WARN);
        assert_eq!(tctl.get_target("t1").unwrap().level(), LevelFilter::WARN);
        assert_eq!(tctl.get_target("t2").unwrap().level(), LevelFilter::WARN);
    }

    #[test]
    #[serial]
    fn test_runtime_registration() {
        let tctl = get_trace_ctl();
        tctl.register("runtime-target", "runtime", LevelFilter::TRACE, &[], true);
        let target = tctl.get_target("runtime-target").unwrap();
        assert!(target.is_custom());
        assert_eq!(target.level(), LevelFilter::TRACE);
        assert!(tctl.as_config_string().contains("runtime=trace"));
    }

    #[test]
    #[serial]
    fn test_setup_from_string() {
        custom_target!("target-4", LevelFilter::INFO, &[]);
        TracingControl::init();
        let tctl = get_trace_ctl();

        tctl.setup_from_string("default=warn, target-4=error").unwrap();
        assert_eq!(tctl.default_level(), LevelFilter::WARN);
        assert_eq!(tctl.get_target("target-4").unwrap().level(), LevelFilter::ERROR);

        assert_eq!(
            tctl.setup_from_string("target-4=bad"),
            Err(LogConfigError::BadLevel {
                tag: "target-4".to_string(),
                level: "bad".to_string()
            })
        );
        assert_eq!(
            tctl.setup_from_string("target-4=error, foo"),
            Err(LogConfigError::MissingLevel("foo".to_string()))
        );
        tctl.set_default_level(LevelFilter::INFO);
    }
}
