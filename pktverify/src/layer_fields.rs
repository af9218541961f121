// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Registry of known dissector fields and their decoders.
//!
//! Field URIs are dotted paths as named by the dissector (`mle.tlv.type`).
//! A URI whose first segment ends with `inner` (`ipv6inner.src`) addresses
//! the second instance of that layer, for tunneled packets. `lowpan` is
//! accepted as an alias of `6lowpan` so that the segment is a valid
//! identifier in filter expressions.
//!
//! Every proper dotted prefix of a registered field is a *container*
//! (`mle.tlv`); containers can be tested for presence but have no value.
//! A small set of *virtual* fields (`coap.is_post`, `icmpv6.is_ping_request`)
//! derive a boolean from a registered field.

use crate::addrs::{EthAddr, ExtAddr, Ipv6Addr};
use crate::bytes::Bytes;
use crate::consts::VALID_LAYER_NAMES;
use crate::packet::{Packet, RawField};
use crate::value::FieldValue;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::trace;

use tracectl::trace_target;
trace_target!("layer-fields", LevelFilter::INFO, &["pktverify"]);

/// How a single field occurrence is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    /// Integer, guessing the notation from the display and raw values.
    Auto,
    Dec,
    Hex,
    /// Integer read from the raw bytes.
    RawHex,
    /// Integer read from the raw bytes in little-endian order.
    RawHexRev,
    Float,
    Str,
    Bytes,
    Payload,
    ExtAddr,
    Ipv6Addr,
    EthAddr,
    /// Set of router ids from a 64-bit router id mask.
    RouterIdSet,
}

/// How the occurrences of a field within one layer are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldParser {
    /// The field occurs once.
    Single(FieldKind),
    /// The field may repeat; only the first occurrence counts.
    First(FieldKind),
    /// Every occurrence, as a list.
    List(FieldKind),
}

/// Errors raised when reading fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field '{0}' is not a known field, container or layer")]
    UnknownField(String),
    #[error("can not parse field {uri} = ({show:?}, {raw:?}) as {kind}")]
    Decode {
        uri: String,
        show: String,
        raw: Option<String>,
        kind: FieldKind,
    },
}

const AUTO: FieldParser = FieldParser::Single(FieldKind::Auto);
const DEC: FieldParser = FieldParser::Single(FieldKind::Dec);
const HEX: FieldParser = FieldParser::Single(FieldKind::Hex);
const RAW_HEX: FieldParser = FieldParser::Single(FieldKind::RawHex);
const RAW_HEX_REV: FieldParser = FieldParser::Single(FieldKind::RawHexRev);
const FLOAT: FieldParser = FieldParser::Single(FieldKind::Float);
const STR: FieldParser = FieldParser::Single(FieldKind::Str);
const BYTES: FieldParser = FieldParser::Single(FieldKind::Bytes);
const PAYLOAD: FieldParser = FieldParser::Single(FieldKind::Payload);
const EXT_ADDR: FieldParser = FieldParser::Single(FieldKind::ExtAddr);
const IPV6_ADDR: FieldParser = FieldParser::Single(FieldKind::Ipv6Addr);
const ETH_ADDR: FieldParser = FieldParser::Single(FieldKind::EthAddr);
const ROUTER_ID_SET: FieldParser = FieldParser::Single(FieldKind::RouterIdSet);

const fn kind_of(p: FieldParser) -> FieldKind {
    match p {
        FieldParser::Single(k) | FieldParser::First(k) | FieldParser::List(k) => k,
    }
}

const fn list(p: FieldParser) -> FieldParser {
    FieldParser::List(kind_of(p))
}

const fn first(p: FieldParser) -> FieldParser {
    FieldParser::First(kind_of(p))
}

#[rustfmt::skip]
const LAYER_FIELDS: &[(&str, FieldParser)] = &[
    // IEEE 802.15.4 MAC
    ("wpan.fcf", RAW_HEX_REV),
    ("wpan.cmd", AUTO),
    ("wpan.security", AUTO),
    ("wpan.frame_type", AUTO),
    ("wpan.pending", AUTO),
    ("wpan.ack_request", AUTO),
    ("wpan.pan_id_compression", AUTO),
    ("wpan.seqno_suppression", AUTO),
    ("wpan.ie_present", AUTO),
    ("wpan.dst_addr_mode", AUTO),
    ("wpan.version", AUTO),
    ("wpan.src_addr_mode", AUTO),
    ("wpan.dst_pan", AUTO),
    ("wpan.seq_no", AUTO),
    ("wpan.src16", AUTO),
    ("wpan.dst16", AUTO),
    ("wpan.src64", EXT_ADDR),
    ("wpan.dst64", EXT_ADDR),
    ("wpan.fcs", RAW_HEX_REV),
    ("wpan.fcs_ok", AUTO),
    ("wpan.frame_length", DEC),
    ("wpan.key_number", AUTO),
    ("wpan.aux_sec.sec_suite", AUTO),
    ("wpan.aux_sec.security_control_field", AUTO),
    ("wpan.aux_sec.sec_level", AUTO),
    ("wpan.aux_sec.key_id_mode", AUTO),
    ("wpan.aux_sec.frame_counter_suppression", AUTO),
    ("wpan.aux_sec.asn_in_nonce", AUTO),
    ("wpan.aux_sec.reserved", AUTO),
    ("wpan.aux_sec.frame_counter", AUTO),
    ("wpan.aux_sec.key_source", AUTO),
    ("wpan.aux_sec.key_index", AUTO),
    ("wpan.aux_sec.hdr", STR),
    ("wpan.mic", AUTO),
    ("wpan.channel", AUTO),
    ("wpan.header_ie.id", list(AUTO)),
    ("wpan.header_ie.csl.period", AUTO),
    ("wpan.payload_ie.vendor.oui", AUTO),
    // MLE
    ("mle.cmd", AUTO),
    ("mle.sec_suite", HEX),
    ("mle.tlv.type", list(DEC)),
    ("mle.tlv.len", list(DEC)),
    ("mle.tlv.mode.receiver_on_idle", AUTO),
    ("mle.tlv.mode.reserved1", AUTO),
    ("mle.tlv.mode.reserved2", AUTO),
    ("mle.tlv.mode.device_type_bit", AUTO),
    ("mle.tlv.mode.network_data", AUTO),
    ("mle.tlv.challenge", BYTES),
    ("mle.tlv.scan_mask.r", AUTO),
    ("mle.tlv.scan_mask.e", AUTO),
    ("mle.tlv.version", AUTO),
    ("mle.tlv.source_addr", AUTO),
    ("mle.tlv.active_tstamp", AUTO),
    ("mle.tlv.pending_tstamp", AUTO),
    ("mle.tlv.leader_data.partition_id", AUTO),
    ("mle.tlv.leader_data.weighting", AUTO),
    ("mle.tlv.leader_data.data_version", AUTO),
    ("mle.tlv.leader_data.stable_data_version", AUTO),
    ("mle.tlv.leader_data.router_id", AUTO),
    ("mle.tlv.route64.nbr_out", list(AUTO)),
    ("mle.tlv.route64.nbr_in", list(AUTO)),
    ("mle.tlv.route64.id_seq", AUTO),
    ("mle.tlv.route64.id_mask", ROUTER_ID_SET),
    ("mle.tlv.route64.cost", list(AUTO)),
    ("mle.tlv.response", BYTES),
    ("mle.tlv.mle_frm_cntr", AUTO),
    ("mle.tlv.ll_frm_cntr", AUTO),
    ("mle.tlv.link_margin", AUTO),
    ("mle.tlv.conn.sed_dgram_cnt", AUTO),
    ("mle.tlv.conn.sed_buf_size", AUTO),
    ("mle.tlv.conn.lq3", AUTO),
    ("mle.tlv.conn.lq2", AUTO),
    ("mle.tlv.conn.lq1", AUTO),
    ("mle.tlv.conn.leader_cost", AUTO),
    ("mle.tlv.conn.id_seq", AUTO),
    ("mle.tlv.conn.flags.pp", AUTO),
    ("mle.tlv.conn.active_rtrs", AUTO),
    ("mle.tlv.timeout", AUTO),
    ("mle.tlv.addr16", AUTO),
    ("mle.tlv.channel", AUTO),
    ("mle.tlv.addr_reg_iid", list(AUTO)),
    ("mle.tlv.link_enh_ack_flags", AUTO),
    ("mle.tlv.link_forward_series", list(AUTO)),
    ("mle.tlv.link_sub_tlv", AUTO),
    ("mle.tlv.link_status_sub_tlv", AUTO),
    ("mle.tlv.query_id", AUTO),
    ("mle.tlv.metric_type_id_flags.type", list(HEX)),
    ("mle.tlv.metric_type_id_flags.metric", list(HEX)),
    ("mle.tlv.metric_type_id_flags.l", list(HEX)),
    ("mle.tlv.link_requested_type_id_flags", BYTES),
    // IPv4
    ("ip.version", AUTO),
    ("ip.src", STR),
    ("ip.src_host", STR),
    ("ip.dst", STR),
    ("ip.dst_host", STR),
    ("ip.ttl", AUTO),
    ("ip.proto", AUTO),
    ("ip.len", AUTO),
    ("ip.id", AUTO),
    ("ip.host", list(STR)),
    ("ip.hdr_len", DEC),
    ("ip.frag_offset", AUTO),
    ("ip.flags.rb", AUTO),
    ("ip.flags.mf", AUTO),
    ("ip.flags.df", AUTO),
    ("ip.dsfield.ecn", AUTO),
    ("ip.dsfield.dscp", AUTO),
    ("ip.checksum.status", AUTO),
    ("ip.addr", list(STR)),
    ("ip.options.routeralert", BYTES),
    ("ip.opt.type.number", AUTO),
    ("ip.opt.type.copy", AUTO),
    ("ip.opt.type.class", AUTO),
    ("ip.opt.ra", AUTO),
    ("ip.opt.len", AUTO),
    // UDP
    ("udp.stream", AUTO),
    ("udp.srcport", AUTO),
    ("udp.dstport", AUTO),
    ("udp.length", AUTO),
    ("udp.port", list(DEC)),
    ("udp.checksum.status", AUTO),
    // IPv6
    ("ipv6.version", AUTO),
    ("ipv6.src", IPV6_ADDR),
    ("ipv6.src_host", IPV6_ADDR),
    ("ipv6.dst", IPV6_ADDR),
    ("ipv6.dst_host", IPV6_ADDR),
    ("ipv6.addr", list(IPV6_ADDR)),
    ("ipv6.tclass.dscp", AUTO),
    ("ipv6.tclass.ecn", AUTO),
    ("ipv6.flow", AUTO),
    ("ipv6.hlim", AUTO),
    ("ipv6.nxt", AUTO),
    ("ipv6.hopopts.len", AUTO),
    ("ipv6.hopopts.nxt", AUTO),
    ("ipv6.hopopts.len_oct", DEC),
    ("ipv6.host", list(IPV6_ADDR)),
    ("ipv6.plen", AUTO),
    ("ipv6.opt.type.rest", list(AUTO)),
    ("ipv6.opt.type.change", list(AUTO)),
    ("ipv6.opt.type.action", list(AUTO)),
    ("ipv6.opt.router_alert", AUTO),
    ("ipv6.opt.padn", STR),
    ("ipv6.opt.length", list(AUTO)),
    ("ipv6.opt.mpl.seed_id", BYTES),
    ("ipv6.opt.mpl.sequence", AUTO),
    ("ipv6.opt.mpl.flag.v", AUTO),
    ("ipv6.opt.mpl.flag.s", AUTO),
    ("ipv6.opt.mpl.flag.rsv", AUTO),
    ("ipv6.opt.mpl.flag.m", AUTO),
    // Ethernet
    ("eth.src", ETH_ADDR),
    ("eth.src_resolved", ETH_ADDR),
    ("eth.dst", ETH_ADDR),
    ("eth.dst_resolved", ETH_ADDR),
    ("eth.type", AUTO),
    ("eth.addr", list(ETH_ADDR)),
    ("eth.addr_resolved", list(ETH_ADDR)),
    ("eth.ig", list(AUTO)),
    ("eth.lg", list(AUTO)),
    // 6LoWPAN
    ("6lowpan.src", IPV6_ADDR),
    ("6lowpan.dst", IPV6_ADDR),
    ("6lowpan.udp.src", AUTO),
    ("6lowpan.udp.dst", AUTO),
    ("6lowpan.udp.checksum", AUTO),
    ("6lowpan.frag.offset", AUTO),
    ("6lowpan.frag.tag", AUTO),
    ("6lowpan.frag.size", AUTO),
    ("6lowpan.pattern", list(AUTO)),
    ("6lowpan.hops", AUTO),
    ("6lowpan.padding", AUTO),
    ("6lowpan.next", AUTO),
    ("6lowpan.flow", AUTO),
    ("6lowpan.ecn", AUTO),
    ("6lowpan.iphc.tf", AUTO),
    ("6lowpan.iphc.m", AUTO),
    ("6lowpan.iphc.nh", AUTO),
    ("6lowpan.iphc.hlim", AUTO),
    ("6lowpan.iphc.cid", AUTO),
    ("6lowpan.iphc.sac", AUTO),
    ("6lowpan.iphc.sam", AUTO),
    ("6lowpan.iphc.dac", AUTO),
    ("6lowpan.iphc.dam", AUTO),
    ("6lowpan.iphc.sci", AUTO),
    ("6lowpan.iphc.dci", AUTO),
    ("6lowpan.iphc.sctx.prefix", IPV6_ADDR),
    ("6lowpan.iphc.dctx.prefix", IPV6_ADDR),
    ("6lowpan.mesh.v", AUTO),
    ("6lowpan.nhc.pattern", list(AUTO)),
    ("6lowpan.nhc.udp.checksum", AUTO),
    ("6lowpan.nhc.udp.ports", AUTO),
    ("6lowpan.nhc.ext.nh", AUTO),
    ("6lowpan.nhc.ext.length", AUTO),
    ("6lowpan.nhc.ext.eid", AUTO),
    ("6lowpan.reassembled.length", AUTO),
    ("6lowpan.fragments", STR),
    ("6lowpan.fragment.count", AUTO),
    ("6lowpan.mesh.orig16", AUTO),
    ("6lowpan.mesh.hops8", AUTO),
    ("6lowpan.mesh.hops", AUTO),
    ("6lowpan.mesh.f", AUTO),
    ("6lowpan.mesh.dest16", AUTO),
    // ICMPv6
    ("icmpv6.type", first(AUTO)),
    ("icmpv6.code", first(AUTO)),
    ("icmpv6.checksum", first(AUTO)),
    ("icmpv6.reserved", RAW_HEX),
    ("icmpv6.resptime", FLOAT),
    ("icmpv6.resp_to", AUTO),
    ("icmpv6.mldr.nb_mcast_records", AUTO),
    ("icmpv6.nd.ra.cur_hop_limit", AUTO),
    ("icmpv6.nd.ns.target_address", IPV6_ADDR),
    ("icmpv6.nd.na.target_address", IPV6_ADDR),
    ("icmpv6.nd.na.flag.s", AUTO),
    ("icmpv6.nd.na.flag.o", AUTO),
    ("icmpv6.nd.na.flag.r", AUTO),
    ("icmpv6.nd.na.flag.rsv", AUTO),
    ("icmpv6.mldr.mar.record_type", list(AUTO)),
    ("icmpv6.mldr.mar.aux_data_len", list(AUTO)),
    ("icmpv6.mldr.mar.nb_sources", list(AUTO)),
    ("icmpv6.mldr.mar.multicast_address", list(IPV6_ADDR)),
    ("icmpv6.opt.type", list(AUTO)),
    ("icmpv6.opt.nonce", BYTES),
    ("icmpv6.opt.linkaddr", ETH_ADDR),
    ("icmpv6.opt.src_linkaddr", ETH_ADDR),
    ("icmpv6.opt.target_linkaddr", ETH_ADDR),
    ("icmpv6.opt.route_lifetime", AUTO),
    ("icmpv6.opt.route_info.flag.route_preference", AUTO),
    ("icmpv6.opt.route_info.flag.reserved", AUTO),
    ("icmpv6.opt.prefix", list(IPV6_ADDR)),
    ("icmpv6.opt.length", list(AUTO)),
    ("icmpv6.opt.reserved", STR),
    ("icmpv6.nd.ra.router_lifetime", AUTO),
    ("icmpv6.nd.ra.retrans_timer", AUTO),
    ("icmpv6.nd.ra.reachable_time", AUTO),
    ("icmpv6.nd.ra.flag.rsv", AUTO),
    ("icmpv6.nd.ra.flag.prf", AUTO),
    ("icmpv6.nd.ra.flag.p", AUTO),
    ("icmpv6.nd.ra.flag.o", AUTO),
    ("icmpv6.nd.ra.flag.m", AUTO),
    ("icmpv6.nd.ra.flag.h", AUTO),
    ("icmpv6.echo.sequence_number", AUTO),
    ("icmpv6.echo.identifier", AUTO),
    ("icmpv6.data.len", AUTO),
    // CoAP
    ("coap.code", AUTO),
    ("coap.version", AUTO),
    ("coap.type", AUTO),
    ("coap.mid", AUTO),
    ("coap.token_len", AUTO),
    ("coap.token", AUTO),
    ("coap.opt.uri_path", list(STR)),
    ("coap.opt.name", list(STR)),
    ("coap.opt.length", list(AUTO)),
    ("coap.opt.uri_path_recon", STR),
    ("coap.payload", PAYLOAD),
    ("coap.payload_length", AUTO),
    ("coap.payload_desc", STR),
    ("coap.opt.end_marker", AUTO),
    ("coap.opt.desc", list(STR)),
    ("coap.opt.delta", list(AUTO)),
    ("coap.response_to", AUTO),
    ("coap.response_time", FLOAT),
    // Thread TLVs dissected as CoAP payload
    ("coap.tlv.type", list(AUTO)),
    ("coap.tlv.status", AUTO),
    ("coap.tlv.target_eid", IPV6_ADDR),
    ("coap.tlv.ml_eid", EXT_ADDR),
    ("coap.tlv.last_transaction_time", AUTO),
    ("coap.tlv.rloc16", AUTO),
    ("coap.tlv.net_name", STR),
    ("coap.tlv.ext_mac_addr", EXT_ADDR),
    ("coap.tlv.router_mask_assigned", AUTO),
    ("coap.tlv.router_mask_id_seq", AUTO),
    // DTLS
    ("dtls.handshake.type", list(AUTO)),
    ("dtls.handshake.cookie", AUTO),
    ("dtls.record.content_type", list(AUTO)),
    ("dtls.alert_message.desc", AUTO),
    // Thread beacon
    ("thread_bcn.protocol", AUTO),
    ("thread_bcn.version", AUTO),
    ("thread_bcn.network_name", STR),
    ("thread_bcn.epid", EXT_ADDR),
    // Thread address management
    ("thread_address.tlv.len", list(AUTO)),
    ("thread_address.tlv.type", list(AUTO)),
    ("thread_address.tlv.status", AUTO),
    ("thread_address.tlv.ext_mac_addr", EXT_ADDR),
    ("thread_address.tlv.router_mask_id_seq", AUTO),
    ("thread_address.tlv.router_mask_assigned", BYTES),
    ("thread_address.tlv.rloc16", HEX),
    ("thread_address.tlv.target_eid", IPV6_ADDR),
    ("thread_address.tlv.ml_eid", EXT_ADDR),
    // Thread backbone link
    ("thread_bl.tlv.type", list(AUTO)),
    ("thread_bl.tlv.len", list(AUTO)),
    ("thread_bl.tlv.target_eid", IPV6_ADDR),
    ("thread_bl.tlv.ml_eid", EXT_ADDR),
    ("thread_bl.tlv.last_transaction_time", AUTO),
    ("thread_bl.tlv.timeout", AUTO),
    // Thread neighbor management
    ("thread_nm.tlv.type", list(AUTO)),
    ("thread_nm.tlv.ml_eid", EXT_ADDR),
    ("thread_nm.tlv.target_eid", IPV6_ADDR),
    ("thread_nm.tlv.status", AUTO),
    ("thread_nm.tlv.timeout", AUTO),
    // MeshCoP TLVs are carried by several layers
    ("thread_meshcop.len_size_mismatch", STR),
    ("thread_meshcop.tlv.type", list(AUTO)),
    ("thread_meshcop.tlv.len8", list(AUTO)),
    ("thread_meshcop.tlv.net_name", list(STR)),
    ("thread_meshcop.tlv.commissioner_id", STR),
    ("thread_meshcop.tlv.commissioner_sess_id", AUTO),
    ("thread_meshcop.tlv.channel_page", AUTO),
    ("thread_meshcop.tlv.channel", list(AUTO)),
    ("thread_meshcop.tlv.chan_mask", STR),
    ("thread_meshcop.tlv.chan_mask_page", AUTO),
    ("thread_meshcop.tlv.chan_mask_len", AUTO),
    ("thread_meshcop.tlv.chan_mask_mask", BYTES),
    ("thread_meshcop.tlv.discovery_req_ver", AUTO),
    ("thread_meshcop.tlv.discovery_rsp_ver", AUTO),
    ("thread_meshcop.tlv.discovery_rsp_n", AUTO),
    ("thread_meshcop.tlv.energy_list", list(AUTO)),
    ("thread_meshcop.tlv.pan_id", list(AUTO)),
    ("thread_meshcop.tlv.xpan_id", BYTES),
    ("thread_meshcop.tlv.ml_prefix", BYTES),
    ("thread_meshcop.tlv.master_key", BYTES),
    ("thread_meshcop.tlv.pskc", BYTES),
    ("thread_meshcop.tlv.sec_policy_rot", AUTO),
    ("thread_meshcop.tlv.sec_policy_o", AUTO),
    ("thread_meshcop.tlv.sec_policy_n", AUTO),
    ("thread_meshcop.tlv.sec_policy_r", AUTO),
    ("thread_meshcop.tlv.sec_policy_c", AUTO),
    ("thread_meshcop.tlv.sec_policy_b", AUTO),
    ("thread_meshcop.tlv.state", AUTO),
    ("thread_meshcop.tlv.steering_data", BYTES),
    ("thread_meshcop.tlv.unknown", BYTES),
    ("thread_meshcop.tlv.udp_port", list(AUTO)),
    ("thread_meshcop.tlv.ba_locator", AUTO),
    ("thread_meshcop.tlv.jr_locator", AUTO),
    ("thread_meshcop.tlv.active_tstamp", AUTO),
    ("thread_meshcop.tlv.pending_tstamp", AUTO),
    ("thread_meshcop.tlv.delay_timer", AUTO),
    ("thread_meshcop.tlv.ipv6_addr", list(IPV6_ADDR)),
    // Thread network data
    ("thread_nwd.tlv.type", list(AUTO)),
    ("thread_nwd.tlv.len", list(AUTO)),
    ("thread_nwd.tlv.stable", list(AUTO)),
    ("thread_nwd.tlv.service.t", AUTO),
    ("thread_nwd.tlv.service.s_id", AUTO),
    ("thread_nwd.tlv.service.s_data_len", AUTO),
    ("thread_nwd.tlv.service.s_data.seqno", AUTO),
    ("thread_nwd.tlv.service.s_data.rrdelay", AUTO),
    ("thread_nwd.tlv.service.s_data.mlrtimeout", AUTO),
    ("thread_nwd.tlv.server_16", list(AUTO)),
    ("thread_nwd.tlv.border_router_16", list(AUTO)),
    ("thread_nwd.tlv.sub_tlvs", list(STR)),
    // TODO: split out thread_nwd.tlv.prefix.length and thread_nwd.tlv.prefix.domain_id
    ("thread_nwd.tlv.prefix", list(IPV6_ADDR)),
    ("thread_nwd.tlv.border_router.pref", AUTO),
    ("thread_nwd.tlv.border_router.flag.s", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.r", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.p", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.o", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.n", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.dp", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.d", list(AUTO)),
    ("thread_nwd.tlv.border_router.flag.c", list(AUTO)),
    ("thread_nwd.tlv.6co.flag.reserved", AUTO),
    ("thread_nwd.tlv.6co.flag.cid", AUTO),
    ("thread_nwd.tlv.6co.flag.c", list(AUTO)),
    ("thread_nwd.tlv.6co.context_length", AUTO),
    // Thread diagnostics
    ("thread_diagnostic.tlv.type", list(AUTO)),
    ("thread_diagnostic.tlv.len8", list(AUTO)),
    ("thread_diagnostic.tlv.general", list(STR)),
    // DNS
    ("dns.resp.ttl", AUTO),
    ("dns.flags.response", AUTO),
];

/// Boolean fields derived from a registered field: `(uri, base field, value)`.
const VIRTUAL_FIELDS: &[(&str, &str, i128)] = &[
    ("wpan.is_beacon", "wpan.frame_type", 0),
    ("wpan.is_data", "wpan.frame_type", 1),
    ("wpan.is_ack", "wpan.frame_type", 2),
    ("wpan.is_cmd", "wpan.frame_type", 3),
    ("coap.is_get", "coap.code", 1),
    ("coap.is_post", "coap.code", 2),
    ("coap.is_put", "coap.code", 3),
    ("coap.is_delete", "coap.code", 4),
    ("coap.is_con", "coap.type", 0),
    ("coap.is_non", "coap.type", 1),
    ("coap.is_ack", "coap.type", 2),
    ("coap.is_rst", "coap.type", 3),
    ("icmpv6.is_ping_request", "icmpv6.type", 128),
    ("icmpv6.is_ping_reply", "icmpv6.type", 129),
    ("icmpv6.is_mldv2_query", "icmpv6.type", 130),
    ("icmpv6.is_router_solicitation", "icmpv6.type", 133),
    ("icmpv6.is_router_advertisement", "icmpv6.type", 134),
    ("icmpv6.is_neighbor_solicitation", "icmpv6.type", 135),
    ("icmpv6.is_neighbor_advertisement", "icmpv6.type", 136),
    ("icmpv6.is_mldv2_report", "icmpv6.type", 143),
];

struct Registry {
    fields: HashMap<&'static str, FieldParser>,
    containers: HashSet<String>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let fields: HashMap<_, _> = LAYER_FIELDS.iter().copied().collect();
        let mut containers = HashSet::new();
        for uri in fields.keys() {
            let mut end = 0;
            while let Some(dot) = uri[end..].find('.') {
                end += dot;
                if end > uri.find('.').unwrap_or(0) {
                    containers.insert(uri[..end].to_string());
                }
                end += 1;
            }
        }
        Registry { fields, containers }
    })
}

/// Returns true if `uri` is a registered field.
#[must_use]
pub fn is_layer_field(uri: &str) -> bool {
    registry().fields.contains_key(uri)
}

/// Returns true if `uri` is a proper prefix (at a dot boundary, below the
/// layer name) of a registered field.
#[must_use]
pub fn is_layer_field_container(uri: &str) -> bool {
    registry().containers.contains(uri)
}

#[must_use]
pub fn is_virtual_field(uri: &str) -> bool {
    VIRTUAL_FIELDS.iter().any(|(v, _, _)| *v == uri)
}

#[must_use]
pub fn is_valid_layer_name(name: &str) -> bool {
    VALID_LAYER_NAMES.contains(&name)
}

/// The decoder registered for a field.
#[must_use]
pub fn field_parser(uri: &str) -> Option<FieldParser> {
    registry().fields.get(uri).copied()
}

/// Returns true if `uri` names something [`get_layer_field`] can read: a
/// layer, a field, a container or a virtual field.
#[must_use]
pub fn is_known_path(uri: &str) -> bool {
    let path = FieldPath::parse(uri);
    if path.uri == path.layer {
        return is_valid_layer_name(&path.layer);
    }
    is_layer_field(&path.uri)
        || is_layer_field_container(&path.uri)
        || is_virtual_field(&path.uri)
}

/// Returns true if some registered field starts with `prefix`, which makes
/// `prefix` usable with [`check_layer_field_has`].
#[must_use]
pub fn is_field_prefix(prefix: &str) -> bool {
    let path = FieldPath::parse(prefix);
    if path.uri == path.layer {
        return is_valid_layer_name(&path.layer);
    }
    registry().fields.keys().any(|k| k.starts_with(path.uri.as_str()))
}

/// A field URI split into the layer it lives in and the layer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldPath {
    layer: String,
    depth: usize,
    uri: String,
}

impl FieldPath {
    fn parse(uri: &str) -> FieldPath {
        let (head, rest) = match uri.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (uri, None),
        };
        let (head, depth) = match head.strip_suffix("inner") {
            Some(base) if !base.is_empty() => (base, 1),
            _ => (head, 0),
        };
        let layer = if head == "lowpan" { "6lowpan" } else { head };
        let uri = match rest {
            Some(rest) => format!("{layer}.{rest}"),
            None => layer.to_string(),
        };
        FieldPath {
            layer: layer.to_string(),
            depth,
            uri,
        }
    }
}

/// Layers that may carry fields of `layer`: Thread TLV families are
/// dissected inside the messages that transport them.
fn candidate_layer_names(layer: &str) -> Vec<&str> {
    match layer {
        "thread_meshcop" => vec!["thread_meshcop", "mle", "coap", "thread_bl", "thread_nm"],
        "thread_nwd" => vec!["mle", "thread_address", "thread_diagnostic"],
        "wpan" => vec!["wpan", "mle"],
        "ip" => vec!["ip", "ipv6"],
        other => vec![other],
    }
}

/// Read a field, container, layer or virtual field from a packet.
///
/// Absent fields read as [`FieldValue::Null`]; present layers and
/// containers read as [`FieldValue::Container`].
///
/// # Errors
///
/// Fails if the URI is not known to the registry or if the field is present
/// but its value cannot be decoded.
pub fn get_layer_field(packet: &Packet, uri: &str) -> Result<FieldValue, FieldError> {
    resolve(packet, &FieldPath::parse(uri))
}

fn resolve(packet: &Packet, path: &FieldPath) -> Result<FieldValue, FieldError> {
    if path.uri == path.layer {
        if !is_valid_layer_name(&path.layer) {
            return Err(FieldError::UnknownField(path.uri.clone()));
        }
        let present = packet.layers_named(&path.layer).nth(path.depth).is_some();
        return Ok(if present {
            FieldValue::Container(path.uri.clone())
        } else {
            FieldValue::Null
        });
    }

    if let Some(parser) = field_parser(&path.uri) {
        for name in candidate_layer_names(&path.layer) {
            let Some(layer) = packet.layers_named(name).nth(path.depth) else {
                continue;
            };
            if let Some(occurrences) = layer.get(&path.uri) {
                let value = decode(&path.uri, parser, occurrences)?;
                trace!("#{} [{} = {value}]", packet.number(), path.uri);
                return Ok(value);
            }
        }
        trace!("#{} [{} = null]", packet.number(), path.uri);
        return Ok(FieldValue::Null);
    }

    if let Some((_, base, expected)) = VIRTUAL_FIELDS.iter().find(|(v, _, _)| *v == path.uri) {
        let base = FieldPath {
            layer: path.layer.clone(),
            depth: path.depth,
            uri: (*base).to_string(),
        };
        return Ok(match resolve(packet, &base)?.as_int() {
            Some(v) => FieldValue::Bool(v == *expected),
            None => FieldValue::Null,
        });
    }

    if is_layer_field_container(&path.uri) {
        let present = candidate_layer_names(&path.layer)
            .into_iter()
            .filter_map(|name| packet.layers_named(name).nth(path.depth))
            .any(|layer| layer.has_path(&path.uri));
        return Ok(if present {
            FieldValue::Container(path.uri.clone())
        } else {
            FieldValue::Null
        });
    }

    Err(FieldError::UnknownField(path.uri.clone()))
}

/// Returns true if the packet carries the given field, or any field under
/// the given container, in any instance of the candidate layers.
///
/// # Errors
///
/// Fails if `uri` is neither a field nor a container.
pub fn check_layer_field_exists(packet: &Packet, uri: &str) -> Result<bool, FieldError> {
    let path = FieldPath::parse(uri);
    if !is_layer_field(&path.uri) && !is_layer_field_container(&path.uri) {
        return Err(FieldError::UnknownField(path.uri));
    }
    Ok(candidate_layer_names(&path.layer)
        .into_iter()
        .flat_map(|name| packet.layers_named(name))
        .any(|layer| layer.has_path(&path.uri)))
}

/// Returns true if the packet carries a field named `<uri>.<sub>` or
/// `<uri>_<sub>` (or anything under those), e.g. `thread_nwd.tlv.server`
/// with `16` matches `thread_nwd.tlv.server_16`.
///
/// # Errors
///
/// Fails if no registered field starts with `uri`.
pub fn check_layer_field_has(packet: &Packet, uri: &str, sub: &str) -> Result<bool, FieldError> {
    let path = FieldPath::parse(uri);
    if !is_field_prefix(uri) {
        return Err(FieldError::UnknownField(path.uri));
    }
    let dotted = format!("{}.{sub}", path.uri);
    let underscored = format!("{}_{sub}", path.uri);
    Ok(candidate_layer_names(&path.layer)
        .into_iter()
        .flat_map(|name| packet.layers_named(name))
        .any(|layer| layer.has_path(&dotted) || layer.has_path(&underscored)))
}

fn decode(
    uri: &str,
    parser: FieldParser,
    occurrences: &[RawField],
) -> Result<FieldValue, FieldError> {
    let one = |kind: FieldKind, field: &RawField| {
        decode_one(kind, field).ok_or_else(|| FieldError::Decode {
            uri: uri.to_string(),
            show: field.show.clone(),
            raw: field.raw.clone(),
            kind,
        })
    };
    match parser {
        FieldParser::Single(kind) | FieldParser::First(kind) => match occurrences.first() {
            Some(field) => one(kind, field),
            None => Ok(FieldValue::Null),
        },
        FieldParser::List(kind) => occurrences
            .iter()
            .map(|field| one(kind, field))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::List),
    }
}

fn parse_hex(s: &str) -> Option<i128> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    i128::from_str_radix(s, 16).ok()
}

fn raw_or_show(field: &RawField) -> String {
    match &field.raw {
        Some(raw) => raw.clone(),
        None => field.show.replace(':', ""),
    }
}

/// Decode one occurrence; `None` if the value does not fit the kind.
fn decode_one(kind: FieldKind, field: &RawField) -> Option<FieldValue> {
    let show = field.show.as_str();
    match kind {
        FieldKind::Auto => parse_auto(show, field.raw.as_deref()).map(FieldValue::Int),
        FieldKind::Dec => show.trim().parse::<i128>().ok().map(FieldValue::Int),
        FieldKind::Hex => parse_hex(show).map(FieldValue::Int),
        FieldKind::RawHex => parse_hex(&raw_or_show(field)).map(FieldValue::Int),
        FieldKind::RawHexRev => {
            let bytes = Bytes::from_hex(&raw_or_show(field)).ok()?;
            let mut reversed = bytes.into_inner();
            reversed.reverse();
            Bytes::new(reversed)
                .to_uint()
                .and_then(|v| i128::try_from(v).ok())
                .map(FieldValue::Int)
        }
        FieldKind::Float => show.trim().parse::<f64>().ok().map(FieldValue::Float),
        FieldKind::Str => Some(FieldValue::Str(show.to_string())),
        FieldKind::Bytes | FieldKind::Payload => {
            Bytes::from_hex(&raw_or_show(field)).ok().map(FieldValue::Bytes)
        }
        FieldKind::ExtAddr => ExtAddr::try_from(show).ok().map(FieldValue::ExtAddr),
        FieldKind::Ipv6Addr => Ipv6Addr::try_from(show).ok().map(FieldValue::Ipv6),
        FieldKind::EthAddr => EthAddr::try_from(show).ok().map(FieldValue::EthAddr),
        FieldKind::RouterIdSet => parse_router_id_set(show),
    }
}

/// Guess the integer notation of a field: `0x` hex, plain decimal checked
/// against the raw bytes, colon-separated hex octets or a dissector
/// timestamp (seconds since the epoch).
fn parse_auto(show: &str, raw: Option<&str>) -> Option<i128> {
    if let Some(hex) = show.strip_prefix("0x") {
        return i128::from_str_radix(hex, 16).ok();
    }

    let dec = show.parse::<i128>().ok();
    let raw_int = raw.and_then(|r| i128::from_str_radix(r, 16).ok());

    if let Some(d) = dec {
        if raw == Some(show) || raw_int == Some(d) || raw.is_none() {
            return Some(d);
        }
    }

    let colon_hex = show.contains(':') && !show.contains("::");
    if colon_hex && raw.is_some_and(|r| show.replace(':', "") == r) {
        return raw_int;
    }

    if let Some(ts) = parse_timestamp(show) {
        return Some(ts);
    }

    // the raw bytes hold a wider bitfield than the value itself
    if raw_int.is_some() {
        return dec;
    }

    None
}

/// Parse a dissector absolute time such as
/// `Jan  1, 1970 08:00:00.000000000 CST` as UTC, ignoring the zone name.
fn parse_timestamp(show: &str) -> Option<i128> {
    let (datetime, _zone) = show.trim().rsplit_once(' ')?;
    let parsed = NaiveDateTime::parse_from_str(datetime, "%b %e, %Y %H:%M:%S%.f").ok()?;
    Some(i128::from(parsed.and_utc().timestamp()))
}

/// Decode a router id mask (hex octets, `:` separated); bit 63 is router 0.
fn parse_router_id_set(show: &str) -> Option<FieldValue> {
    let mask = u64::from_str_radix(&show.replace(':', ""), 16).ok()?;
    Some(FieldValue::Set(
        (0..64u8)
            .filter(|id| mask & (1u64 << (63 - id)) != 0)
            .map(FieldValue::from)
            .collect(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::Layer;
    use pretty_assertions::assert_eq;

    fn raw(show: &str, raw: Option<&str>) -> RawField {
        RawField::new(show, raw.map(ToString::to_string))
    }

    #[test]
    fn registry_is_consistent() {
        for (uri, _) in LAYER_FIELDS {
            let layer = uri.split('.').next().unwrap();
            assert!(is_valid_layer_name(layer), "{uri}: unknown layer {layer}");
            assert!(!is_layer_field_container(uri), "{uri} is both field and container");
        }
        assert!(is_layer_field_container("mle.tlv"));
        assert!(is_layer_field_container("mle.tlv.leader_data"));
        assert!(!is_layer_field_container("mle"));
        assert!(is_layer_field("mle.tlv.type"));
        assert!(!is_layer_field("mle.tlv"));
    }

    #[test]
    fn paths() {
        assert!(is_known_path("lowpan.src"));
        assert!(is_known_path("ipv6inner.src"));
        assert!(is_known_path("coap.is_post"));
        assert!(is_known_path("mle"));
        assert!(!is_known_path("mle.no_such_field"));
        assert!(!is_known_path("nosuchlayer"));
        assert!(is_field_prefix("thread_nwd.tlv.server"));
        assert_eq!(
            FieldPath::parse("ipv6inner.src"),
            FieldPath {
                layer: "ipv6".into(),
                depth: 1,
                uri: "ipv6.src".into()
            }
        );
    }

    #[test]
    fn auto_notations() {
        assert_eq!(parse_auto("0x0400", Some("0004")), Some(0x400));
        assert_eq!(parse_auto("11", Some("0b")), Some(11));
        assert_eq!(parse_auto("11", Some("11")), Some(11));
        assert_eq!(parse_auto("7", None), Some(7));
        assert_eq!(parse_auto("88:00", Some("8800")), Some(0x8800));
        assert_eq!(parse_auto("1", Some("41cc")), Some(1));
        assert_eq!(
            parse_auto("Jan  1, 1970 00:00:10.000000000 UTC", None),
            Some(10)
        );
        assert_eq!(parse_auto("garbage", None), None);
    }

    #[test]
    fn kinds() {
        assert_eq!(
            decode_one(FieldKind::RawHexRev, &raw("0x1234", Some("3412"))),
            Some(FieldValue::Int(0x1234))
        );
        assert_eq!(
            decode_one(FieldKind::Hex, &raw("0x00ff", None)),
            Some(FieldValue::Int(255))
        );
        assert_eq!(
            decode_one(FieldKind::Bytes, &raw("de:ad", Some("dead"))),
            Some(FieldValue::Bytes(Bytes::from_hex("dead").unwrap()))
        );
        assert_eq!(
            decode_one(FieldKind::RouterIdSet, &raw("c0:00:00:00:00:00:00:01", None)),
            Some(FieldValue::Set(vec![0u8.into(), 1u8.into(), 63u8.into()]))
        );
        assert_eq!(decode_one(FieldKind::Dec, &raw("x", None)), None);
    }

    fn tunneled() -> Packet {
        let mut outer = Layer::new("ipv6");
        outer.push("ipv6.src", raw("fd00::1", None));
        let mut inner = Layer::new("ipv6");
        inner.push("ipv6.src", raw("fd00::2", None));
        let mut coap = Layer::new("coap");
        coap.push("coap.code", raw("2", Some("02")));
        coap.push("coap.opt.uri_path", raw("a", None));
        coap.push("coap.opt.uri_path", raw("as", None));
        let mut mle = Layer::new("mle");
        mle.push("thread_nwd.tlv.server_16", raw("1024", Some("0400")));
        Packet::new(0, 1, 0.0, vec![outer, inner, coap, mle])
    }

    #[test]
    fn layer_depth_and_lists() {
        let p = tunneled();
        assert_eq!(
            get_layer_field(&p, "ipv6.src").unwrap(),
            FieldValue::Ipv6(Ipv6Addr::try_from("fd00::1").unwrap())
        );
        assert_eq!(
            get_layer_field(&p, "ipv6inner.src").unwrap(),
            FieldValue::Ipv6(Ipv6Addr::try_from("fd00::2").unwrap())
        );
        assert_eq!(
            get_layer_field(&p, "coap.opt.uri_path").unwrap(),
            FieldValue::from(vec!["a", "as"])
        );
        assert_eq!(get_layer_field(&p, "udp.srcport").unwrap(), FieldValue::Null);
        assert!(matches!(
            get_layer_field(&p, "udp.no_such_field"),
            Err(FieldError::UnknownField(_))
        ));
    }

    #[test]
    fn virtual_and_containers() {
        let p = tunneled();
        assert_eq!(get_layer_field(&p, "coap.is_post").unwrap(), FieldValue::Bool(true));
        assert_eq!(get_layer_field(&p, "coap.is_get").unwrap(), FieldValue::Bool(false));
        assert_eq!(get_layer_field(&p, "icmpv6.is_ping_request").unwrap(), FieldValue::Null);
        assert_eq!(
            get_layer_field(&p, "coap.opt").unwrap(),
            FieldValue::Container("coap.opt".into())
        );
        assert_eq!(get_layer_field(&p, "mle").unwrap(), FieldValue::Container("mle".into()));
        assert_eq!(get_layer_field(&p, "wpan").unwrap(), FieldValue::Null);
    }

    #[test]
    fn candidate_layers_and_has() {
        let p = tunneled();
        assert_eq!(
            get_layer_field(&p, "thread_nwd.tlv.server_16").unwrap(),
            FieldValue::from(vec![1024])
        );
        assert!(check_layer_field_exists(&p, "thread_nwd.tlv").unwrap());
        assert!(!check_layer_field_exists(&p, "thread_nwd.tlv.service").unwrap());
        assert!(check_layer_field_has(&p, "thread_nwd.tlv.server", "16").unwrap());
        assert!(!check_layer_field_has(&p, "thread_nwd.tlv.server", "17").unwrap());
        assert!(check_layer_field_exists(&p, "nope.nope").is_err());
    }

    #[test]
    fn decode_failure_is_an_error() {
        let mut wpan = Layer::new("wpan");
        wpan.push("wpan.src64", raw("not-an-address", None));
        let p = Packet::new(0, 1, 0.0, vec![wpan]);
        assert!(matches!(
            get_layer_field(&p, "wpan.src64"),
            Err(FieldError::Decode { .. })
        ));
        assert_eq!(p.field("wpan.src64"), FieldValue::Null);
    }
}
