// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Declarative verification scenarios.
//!
//! A scenario is a YAML document listing steps. Each step moves the cursor of
//! the verifier capture (`next`, `not_next`, `seek_back`, `set_index`) or runs
//! one of the canned verifications (`attached`, `ping`). Filter arguments
//! naming a variable resolve to its value, then constant names resolve to the
//! constant, and anything else is taken literally.

use ordermap::OrderMap;
use pktverify::consts;
use pktverify::filter::MplSeed;
use pktverify::{
    ChildType, EthAddr, ExprError, ExtAddr, FieldValue, Ipv6Addr, PacketFilter, PacketVerifier,
    PktIndex, Role, Vars, VerifierError, VerifyError,
};
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use tracectl::trace_target;
trace_target!("scenario", LevelFilter::INFO, &["harness"]);

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("can not read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("bad argument '{arg}': {reason}")]
    Argument { arg: String, reason: &'static str },
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    #[error("step {position} ({step}) failed: {source}")]
    Step {
        position: String,
        step: String,
        source: Box<ScenarioError>,
    },
}

impl ScenarioError {
    /// Returns true if the capture does not show what the scenario expects,
    /// as opposed to a scenario that can not be run.
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        match self {
            ScenarioError::Step { source, .. } => source.is_verification_failure(),
            ScenarioError::Verify(e) => matches!(
                e,
                VerifyError::PacketNotFound { .. }
                    | VerifyError::UnexpectedPacketFound { .. }
                    | VerifyError::VerificationFailed { .. }
            ),
            _ => false,
        }
    }
}

/// A scalar argument of a step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Int(i) => write!(f, "{i}"),
            Arg::Bool(b) => write!(f, "{b}"),
            Arg::Str(s) => write!(f, "{s}"),
        }
    }
}

fn parse_literal(s: &str) -> FieldValue {
    let int = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok(),
        None => s.parse::<i128>().ok(),
    };
    int.map_or_else(|| FieldValue::from(s), FieldValue::Int)
}

impl Arg {
    fn resolve(&self, vars: &Vars) -> FieldValue {
        match self {
            Arg::Int(i) => FieldValue::Int(i128::from(*i)),
            Arg::Bool(b) => FieldValue::Bool(*b),
            Arg::Str(s) => vars
                .get(s)
                .cloned()
                .or_else(|| consts::lookup(s).map(FieldValue::from))
                .unwrap_or_else(|| parse_literal(s)),
        }
    }

    fn error(&self, reason: &'static str) -> ScenarioError {
        ScenarioError::Argument {
            arg: self.to_string(),
            reason,
        }
    }

    fn int<T: TryFrom<i128>>(&self, vars: &Vars) -> Result<T, ScenarioError> {
        self.resolve(vars)
            .as_int()
            .and_then(|i| T::try_from(i).ok())
            .ok_or_else(|| self.error("not an integer in range"))
    }

    fn ext_addr(&self, vars: &Vars) -> Result<ExtAddr, ScenarioError> {
        self.resolve(vars)
            .as_ext_addr()
            .ok_or_else(|| self.error("not an extended address"))
    }

    fn eth_addr(&self, vars: &Vars) -> Result<EthAddr, ScenarioError> {
        self.resolve(vars)
            .as_eth_addr()
            .ok_or_else(|| self.error("not an ethernet address"))
    }

    fn ipv6(&self, vars: &Vars) -> Result<Ipv6Addr, ScenarioError> {
        self.resolve(vars)
            .as_ipv6()
            .ok_or_else(|| self.error("not an ipv6 address"))
    }

    fn string(&self, vars: &Vars) -> Result<String, ScenarioError> {
        match self.resolve(vars) {
            FieldValue::Str(s) => Ok(s),
            _ => Err(self.error("not a string")),
        }
    }
}

fn opt_int<T: TryFrom<i128>>(arg: Option<&Arg>, vars: &Vars) -> Result<Option<T>, ScenarioError> {
    arg.map(|a| a.int(vars)).transpose()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoapArgs {
    pub uri: Arg,
    #[serde(default)]
    pub port: Option<Arg>,
    #[serde(default)]
    pub confirmable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SrcDst {
    pub src: Arg,
    pub dst: Arg,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingArgs {
    #[serde(default)]
    pub identifier: Option<Arg>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackboneQueryArgs {
    pub target: Arg,
    pub eth_src: Arg,
    #[serde(default)]
    pub port: Option<Arg>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackboneAnswerArgs {
    pub target: Arg,
    #[serde(default)]
    pub eth_src: Option<Arg>,
    #[serde(default)]
    pub port: Option<Arg>,
    #[serde(default)]
    pub confirmable: Option<bool>,
    /// Mesh-local interface identifier of the target.
    #[serde(default)]
    pub mliid: Option<Arg>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MplArgs {
    /// A seed id, or the RLOC of the seed.
    #[serde(default)]
    pub seed: Option<Arg>,
}

/// One filter of a `next` / `not_next` step. Each maps to the
/// [`PacketFilter`] helper of the same name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSpec {
    Wpan,
    WpanAck,
    WpanBeacon,
    WpanData,
    WpanCmd(Arg),
    WpanSeq(Arg),
    WpanVersion(Arg),
    WpanChannel(Arg),
    WpanSrc16(Arg),
    WpanDst16(Arg),
    WpanSrc16Dst16(SrcDst),
    WpanSrc64(Arg),
    WpanDst64(Arg),
    WpanIePresent,
    WpanIeNotPresent,
    Dst16(Arg),
    Eth,
    EthSrc(Arg),
    Ipv6Dst(Arg),
    #[serde(rename = "ipv6_2dsts")]
    Ipv6TwoDsts(Arg, Arg),
    Ipv6SrcDst(SrcDst),
    LlAnma,
    LlArma,
    RlAnma,
    RlArma,
    LlAtnma,
    RlAtnma,
    LlAbma,
    AmplFma(MplArgs),
    Mle,
    MleCmd(Arg),
    MleCmd2(Arg, Arg),
    MleHasTlv(Vec<Arg>),
    MleAdvertisement(Role),
    Coap,
    CoapRequest(CoapArgs),
    CoapAck(CoapArgs),
    BackboneQuery(BackboneQueryArgs),
    BackboneAnswer(BackboneAnswerArgs),
    PingRequest(PingArgs),
    PingReply(PingArgs),
    Icmpv6,
    Icmpv6NdNs(Arg),
    Icmpv6NdNa(Arg),
    Icmpv6NdRa,
    HasBbrDataset,
    /// A filter expression.
    Expr(String),
}

impl FilterSpec {
    /// Derive the filter from `pkts`.
    ///
    /// # Errors
    ///
    /// Fails on arguments that do not resolve to a value of the right kind
    /// and on invalid expressions.
    pub fn apply(&self, pkts: &PacketFilter, vars: &Vars) -> Result<PacketFilter, ScenarioError> {
        use FilterSpec as F;
        Ok(match self {
            F::Wpan => pkts.filter_wpan(),
            F::WpanAck => pkts.filter_wpan_ack(),
            F::WpanBeacon => pkts.filter_wpan_beacon(),
            F::WpanData => pkts.filter_wpan_data(),
            F::WpanCmd(cmd) => pkts.filter_wpan_cmd(cmd.int(vars)?),
            F::WpanSeq(seq) => pkts.filter_wpan_seq(seq.int(vars)?),
            F::WpanVersion(v) => pkts.filter_wpan_version(v.int(vars)?),
            F::WpanChannel(ch) => pkts.filter_wpan_channel(ch.int(vars)?),
            F::WpanSrc16(a) => pkts.filter_wpan_src16(a.int(vars)?),
            F::WpanDst16(a) => pkts.filter_wpan_dst16(a.int(vars)?),
            F::WpanSrc16Dst16(SrcDst { src, dst }) => {
                pkts.filter_wpan_src16_dst16(src.int(vars)?, dst.int(vars)?)
            }
            F::WpanSrc64(a) => pkts.filter_wpan_src64(a.ext_addr(vars)?),
            F::WpanDst64(a) => pkts.filter_wpan_dst64(a.ext_addr(vars)?),
            F::WpanIePresent => pkts.filter_wpan_ie_present(),
            F::WpanIeNotPresent => pkts.filter_wpan_ie_not_present(),
            F::Dst16(a) => pkts.filter_dst16(a.int(vars)?),
            F::Eth => pkts.filter_eth(),
            F::EthSrc(a) => pkts.filter_eth_src(a.eth_addr(vars)?),
            F::Ipv6Dst(a) => pkts.filter_ipv6_dst(a.ipv6(vars)?),
            F::Ipv6TwoDsts(a1, a2) => pkts.filter_ipv6_2dsts(a1.ipv6(vars)?, a2.ipv6(vars)?),
            F::Ipv6SrcDst(SrcDst { src, dst }) => {
                pkts.filter_ipv6_src_dst(src.ipv6(vars)?, dst.ipv6(vars)?)
            }
            F::LlAnma => pkts.filter_ll_anma(),
            F::LlArma => pkts.filter_ll_arma(),
            F::RlAnma => pkts.filter_rl_anma(),
            F::RlArma => pkts.filter_rl_arma(),
            F::LlAtnma => pkts.filter_ll_atnma(),
            F::RlAtnma => pkts.filter_rl_atnma(),
            F::LlAbma => pkts.filter_ll_abma(),
            F::AmplFma(MplArgs { seed }) => {
                let seed = seed
                    .as_ref()
                    .map(|arg| {
                        match arg.resolve(vars) {
                            FieldValue::Int(id) => u16::try_from(id).ok().map(MplSeed::Rloc16),
                            other => other.as_ipv6().map(MplSeed::Rloc),
                        }
                        .ok_or_else(|| arg.error("not a seed id or rloc"))
                    })
                    .transpose()?;
                pkts.filter_ampl_fma(seed)
            }
            F::Mle => pkts.filter_mle(),
            F::MleCmd(cmd) => pkts.filter_mle_cmd(cmd.int(vars)?),
            F::MleCmd2(cmd1, cmd2) => pkts.filter_mle_cmd2(cmd1.int(vars)?, cmd2.int(vars)?),
            F::MleHasTlv(tlvs) => {
                let tlvs = tlvs
                    .iter()
                    .map(|t| t.int(vars))
                    .collect::<Result<Vec<u8>, _>>()?;
                pkts.filter_mle_has_tlv(&tlvs)
            }
            F::MleAdvertisement(role) => pkts.filter_mle_advertisement(*role),
            F::Coap => pkts.filter_coap(),
            F::CoapRequest(args) => pkts.filter_coap_request(
                &args.uri.string(vars)?,
                opt_int(args.port.as_ref(), vars)?,
                args.confirmable,
            ),
            F::CoapAck(args) => {
                pkts.filter_coap_ack(&args.uri.string(vars)?, opt_int(args.port.as_ref(), vars)?)
            }
            F::BackboneQuery(args) => pkts.filter_backbone_query(
                args.target.ipv6(vars)?,
                args.eth_src.eth_addr(vars)?,
                opt_int(args.port.as_ref(), vars)?,
            ),
            F::BackboneAnswer(args) => pkts.filter_backbone_answer(
                args.target.ipv6(vars)?,
                args.eth_src.as_ref().map(|a| a.eth_addr(vars)).transpose()?,
                opt_int(args.port.as_ref(), vars)?,
                args.confirmable,
                args.mliid.as_ref().map(|a| a.ext_addr(vars)).transpose()?,
            ),
            F::PingRequest(args) => {
                pkts.filter_ping_request(opt_int(args.identifier.as_ref(), vars)?)
            }
            F::PingReply(args) => pkts.filter_ping_reply(opt_int(args.identifier.as_ref(), vars)?),
            F::Icmpv6 => pkts.filter_icmpv6(),
            F::Icmpv6NdNs(target) => pkts.filter_icmpv6_nd_ns(target.ipv6(vars)?),
            F::Icmpv6NdNa(target) => pkts.filter_icmpv6_nd_na(target.ipv6(vars)?),
            F::Icmpv6NdRa => pkts.filter_icmpv6_nd_ra(),
            F::HasBbrDataset => pkts.filter_has_bbr_dataset(),
            F::Expr(source) => pkts.filter_expr(source, vars)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NextStep {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Expression the found packet must satisfy.
    #[serde(default)]
    pub verify: Option<String>,
    /// Fields of the found packet to store as variables.
    #[serde(default)]
    pub record: OrderMap<String, String>,
}

impl NextStep {
    fn build(&self, pkts: &PacketFilter, vars: &Vars) -> Result<PacketFilter, ScenarioError> {
        let mut filter = pkts.filter(|_| true);
        for spec in &self.filters {
            filter = spec.apply(&filter, vars)?;
        }
        Ok(filter)
    }
}

fn default_child_type() -> ChildType {
    ChildType::Mtd
}

fn default_seek_back() -> f64 {
    consts::AUTO_SEEK_BACK_MAX_DURATION
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Attached {
        child: String,
        parent: String,
        #[serde(default = "default_child_type")]
        child_type: ChildType,
    },
    Next(NextStep),
    NotNext(NextStep),
    SeekBack {
        #[serde(default = "default_seek_back")]
        duration: f64,
        #[serde(default)]
        wpan: bool,
        #[serde(default)]
        eth: bool,
    },
    /// Run the nested steps, then restore the cursor.
    PreserveIndex(Vec<Step>),
    Ping {
        src: String,
        dst: String,
    },
    SetIndex(PktIndex),
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Step::Attached { .. } => "attached",
            Step::Next(_) => "next",
            Step::NotNext(_) => "not_next",
            Step::SeekBack { .. } => "seek_back",
            Step::PreserveIndex(_) => "preserve_index",
            Step::Ping { .. } => "ping",
            Step::SetIndex(_) => "set_index",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Steps and filters are single-key maps, `- next: {...}`.
    #[serde(with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario document.
    ///
    /// # Errors
    ///
    /// Fails on invalid YAML or unknown steps and filters.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a scenario document.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be read, see also [`Scenario::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Run every step against the verifier, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Fails with [`ScenarioError::Step`] naming the failed step.
    pub fn run(&self, verifier: &mut PacketVerifier) -> Result<(), ScenarioError> {
        info!(
            "running scenario {}",
            self.name.as_deref().unwrap_or(verifier.test_name())
        );
        run_steps(&self.steps, verifier, "")
    }
}

fn run_steps(steps: &[Step], verifier: &mut PacketVerifier, prefix: &str) -> Result<(), ScenarioError> {
    for (i, step) in steps.iter().enumerate() {
        let position = format!("{prefix}{}", i + 1);
        info!("step {position}: {}", step.kind());
        run_step(step, verifier, &position).map_err(|e| {
            // nested failures are already wrapped
            if matches!(e, ScenarioError::Step { .. }) {
                return e;
            }
            error!("step {position} ({}) failed: {e}", step.kind());
            ScenarioError::Step {
                position: position.clone(),
                step: step.kind().to_string(),
                source: Box::new(e),
            }
        })?;
    }
    Ok(())
}

fn run_step(step: &Step, verifier: &mut PacketVerifier, position: &str) -> Result<(), ScenarioError> {
    match step {
        Step::Attached {
            child,
            parent,
            child_type,
        } => {
            let result = verifier.verify_attached(child, parent, *child_type)?;
            for (name, idx) in result.iter() {
                debug!("{name}: packet at {idx}");
            }
        }
        Step::Next(next) => {
            let found = next.build(verifier.pkts(), verifier.vars())?.must_next()?;
            debug!("found {found}");
            if let Some(cond) = &next.verify {
                found.must_verify_expr(cond, verifier.vars())?;
            }
            let recorded: Vec<(String, FieldValue)> = next
                .record
                .iter()
                .map(|(name, uri)| (name.clone(), found.field(uri)))
                .collect();
            for (name, value) in &recorded {
                info!("recorded {name} = {value}");
            }
            verifier.add_vars(recorded)?;
        }
        Step::NotNext(next) => {
            next.build(verifier.pkts(), verifier.vars())?.must_not_next()?;
        }
        Step::SeekBack { duration, wpan, eth } => {
            verifier.pkts().seek_back(*duration, *wpan, *eth)?;
        }
        Step::PreserveIndex(steps) => {
            let _saved = verifier.pkts().save_index();
            run_steps(steps, verifier, &format!("{position}."))?;
        }
        Step::Ping { src, dst } => {
            verifier.verify_ping(src, dst)?;
        }
        Step::SetIndex(index) => {
            verifier.pkts().set_index(*index)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_utils::{CaptureBuilder, PacketBuilder, TestInfoBuilder, with_test_files};
    use tracing_test::traced_test;

    const LEADER: &str = "16:6e:0a:00:00:00:00:01";
    const ROUTER: &str = "16:6e:0a:00:00:00:00:02";

    fn mle(ts: f64, src: &str, dst: &str, cmd: &str) -> PacketBuilder {
        PacketBuilder::wpan(ts)
            .field("wpan.src64", src)
            .field("wpan.dst64", dst)
            .field("mle.cmd", cmd)
    }

    fn with_verifier<T>(f: impl FnOnce(&mut PacketVerifier) -> T) -> T {
        let info = TestInfoBuilder::new("Cert_5_1_01_RouterAttach")
            .node(1, "LEADER", "166e0a0000000001")
            .node(2, "ROUTER", "166e0a0000000002");
        let capture = CaptureBuilder::new()
            .packet(
                PacketBuilder::wpan(1.0)
                    .field("wpan.src64", ROUTER)
                    .field("ipv6.dst", "ff02::2")
                    .field("mle.cmd", "9"),
            )
            .packet(
                mle(1.5, LEADER, ROUTER, "10")
                    .field("ipv6.hlim", "255")
                    .field("mle.tlv.type", "0")
                    .field("mle.tlv.type", "11"),
            )
            .packet(mle(2.0, ROUTER, LEADER, "11"))
            .packet(mle(2.5, LEADER, ROUTER, "12"));
        with_test_files(info, capture)(|path: &Path| {
            let mut verifier = PacketVerifier::new(path, &[]).unwrap();
            f(&mut verifier)
        })
    }

    const SCENARIO: &str = r"
name: router attach
steps:
  - next:
      filters:
        - wpan_src64: ROUTER
        - mle_cmd: MLE_PARENT_REQUEST
        - ll_arma
  - preserve_index:
      - next:
          filters:
            - mle_cmd: 12
  - next:
      filters:
        - wpan_src64: LEADER
        - mle_has_tlv: [SOURCE_ADDRESS_TLV, LEADER_DATA_TLV]
        - expr: 'wpan.dst64 == {ROUTER}'
      verify: ipv6.hlim == 255
      record:
        PARENT_RESPONSE_CMD: mle.cmd
  - not_next:
      filters:
        - mle_cmd: MLE_PARENT_REQUEST
  - set_index: { wpan: 0, eth: 0 }
  - attached: { child: ROUTER, parent: LEADER, child_type: MTD }
  - set_index: { wpan: 3, eth: 3 }
  - seek_back: { duration: 0.6, wpan: true }
";

    #[test]
    fn parses_scenarios() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("router attach"));
        assert_eq!(scenario.steps.len(), 8);
        let Step::Next(next) = &scenario.steps[0] else {
            panic!("expected a next step");
        };
        assert_eq!(
            next.filters,
            vec![
                FilterSpec::WpanSrc64(Arg::Str("ROUTER".into())),
                FilterSpec::MleCmd(Arg::Str("MLE_PARENT_REQUEST".into())),
                FilterSpec::LlArma,
            ]
        );
        assert_eq!(scenario.steps[4], Step::SetIndex(PktIndex::new(0, 0)));
        assert!(matches!(
            scenario.steps[7],
            Step::SeekBack { wpan: true, eth: false, .. }
        ));

        assert!(matches!(
            Scenario::from_yaml_str("steps: [ { jump: 3 } ]"),
            Err(ScenarioError::Yaml(_))
        ));
    }

    #[test]
    #[traced_test]
    fn runs_scenarios() {
        with_verifier(|v| {
            Scenario::from_yaml_str(SCENARIO).unwrap().run(v).unwrap();
            assert_eq!(v.var("PARENT_RESPONSE_CMD"), Some(&FieldValue::Int(10)));
            // the child id request is the only frame within 0.6s before the
            // response at index 3
            assert_eq!(v.pkts().index(), PktIndex::new(2, 3));
        });
        assert!(logs_contain("step 2.1: next"));
    }

    #[test]
    #[traced_test]
    fn reports_failed_step() {
        with_verifier(|v| {
            let scenario = Scenario::from_yaml_str(
                r"
steps:
  - preserve_index:
      - next: { filters: [ { mle_cmd: MLE_PARENT_RESPONSE } ] }
      - next: { filters: [ { mle_cmd: MLE_PARENT_REQUEST } ] }
",
            )
            .unwrap();
            let err = scenario.run(v).unwrap_err();
            assert!(err.is_verification_failure());
            let ScenarioError::Step { position, step, .. } = &err else {
                panic!("expected a step error, got {err}");
            };
            assert_eq!(position, "1.2");
            assert_eq!(step, "next");
            // preserve_index restored the cursor
            assert_eq!(v.pkts().index(), PktIndex::new(0, 0));
        });
    }

    #[test]
    fn parses_single_key_steps() {
        let scenario = Scenario::from_yaml_str(
            r"
steps:
  - set_index: { wpan: 1, eth: 0 }
  - not_next:
      filters:
        - ipv6_2dsts: [ 'ff02::2', REALM_LOCAL_ALL_ROUTERS_ADDRESS ]
        - mle_cmd2: [ 9, 10 ]
        - mle_advertisement: Router
",
        )
        .unwrap();
        assert_eq!(scenario.steps[0], Step::SetIndex(PktIndex::new(1, 0)));
        let Step::NotNext(next) = &scenario.steps[1] else {
            panic!("expected a not_next step");
        };
        assert_eq!(
            next.filters,
            vec![
                FilterSpec::Ipv6TwoDsts(
                    Arg::Str("ff02::2".into()),
                    Arg::Str("REALM_LOCAL_ALL_ROUTERS_ADDRESS".into())
                ),
                FilterSpec::MleCmd2(Arg::Int(9), Arg::Int(10)),
                FilterSpec::MleAdvertisement(Role::Router),
            ]
        );
    }

    #[test]
    #[traced_test]
    fn runs_backbone_filters() {
        const BR_1_ETH: &str = "02:00:00:00:00:03";
        const BR_2_ETH: &str = "02:00:00:00:00:04";
        const DUA: &str = "fd00:7d03::1234";
        const MLIID: &str = "11:22:33:44:55:66:77:88";
        let info = TestInfoBuilder::new("Cert_BBR_AddressQuery")
            .node(1, "LEADER", "166e0a0000000001")
            .otbr(3, "BR_1", "166e0a0000000003", BR_1_ETH)
            .otbr(4, "BR_2", "166e0a0000000004", BR_2_ETH)
            .extra_var("DUA", DUA)
            .extra_var("MLIID", MLIID);
        let backbone = |ts: f64, src: &str, ty: &str, uri: &str| {
            PacketBuilder::eth(ts)
                .field("eth.src", src)
                .field("udp.dstport", "61631")
                .field("coap.code", "2")
                .field("coap.type", ty)
                .field("coap.opt.uri_path_recon", uri)
                .field("thread_bl.tlv.target_eid", DUA)
        };
        let capture = CaptureBuilder::new()
            .packet(
                PacketBuilder::wpan(1.0)
                    .field("wpan.src16", "0x0400")
                    .field("wpan.dst16", "0x0000")
                    .field("ipv6.dst", "ff03::2"),
            )
            .packet(backbone(2.0, BR_1_ETH, "1", "/b/bq"))
            .packet(backbone(2.1, BR_2_ETH, "0", "/b/ba").field("thread_bl.tlv.ml_eid", MLIID));
        let scenario = Scenario::from_yaml_str(
            r"
steps:
  - next:
      filters:
        - wpan_src16_dst16: { src: 0x0400, dst: 0 }
        - ipv6_2dsts: [ 'ff02::2', REALM_LOCAL_ALL_ROUTERS_ADDRESS ]
  - next:
      filters:
        - backbone_query: { target: DUA, eth_src: BR_1_ETH, port: BB_PORT }
  - not_next:
      filters:
        - backbone_query: { target: DUA, eth_src: BR_2_ETH }
  - next:
      filters:
        - backbone_answer: { target: DUA, eth_src: BR_2_ETH, confirmable: true, mliid: MLIID }
",
        )
        .unwrap();
        with_test_files(info, capture)(|path: &Path| {
            let mut verifier = PacketVerifier::new(path, &[]).unwrap();
            scenario.run(&mut verifier).unwrap();
            assert_eq!(verifier.pkts().last_index(), Some(2));
        });
        assert!(logs_contain("step 4: next"));

        // an unknown mesh-local iid never answers
        let wrong = Scenario::from_yaml_str(
            r"
steps:
  - next:
      filters:
        - backbone_answer: { target: DUA, mliid: '00:00:00:00:00:00:00:01' }
",
        )
        .unwrap();
        let capture = CaptureBuilder::new()
            .packet(backbone(2.1, BR_2_ETH, "0", "/b/ba").field("thread_bl.tlv.ml_eid", MLIID));
        let info = TestInfoBuilder::new("Cert_BBR_AddressQuery").extra_var("DUA", DUA);
        with_test_files(info, capture)(|path: &Path| {
            let mut verifier = PacketVerifier::new(path, &[]).unwrap();
            let err = wrong.run(&mut verifier).unwrap_err();
            assert!(err.is_verification_failure());
        });
    }

    #[test]
    fn resolves_arguments() {
        let mut vars = Vars::new();
        vars.insert("ROUTER".into(), ExtAddr::try_from(ROUTER).unwrap().into());
        assert_eq!(
            Arg::Str("ROUTER".into()).ext_addr(&vars).unwrap(),
            ExtAddr::try_from(ROUTER).unwrap()
        );
        assert_eq!(Arg::Str("MLE_CHILD_ID_REQUEST".into()).int::<u8>(&vars).unwrap(), 11);
        assert_eq!(Arg::Str("0xfffe".into()).int::<u16>(&vars).unwrap(), 0xfffe);
        assert_eq!(Arg::Str("ADDR_SOL_URI".into()).string(&vars).unwrap(), "/a/as");
        assert_eq!(
            Arg::Str("ff02::2".into()).ipv6(&vars).unwrap(),
            Ipv6Addr::try_from("ff02::2").unwrap()
        );
        let err = Arg::Int(300).int::<u8>(&vars).unwrap_err();
        assert!(!err.is_verification_failure());
        assert!(Arg::Str("LEADER".into()).ext_addr(&vars).is_err());
    }
}
