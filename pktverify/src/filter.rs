// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet filter cursor.
//!
//! A [`PacketFilter`] walks a capture with two independent cursors, one for
//! 802.15.4 frames and one for ethernet frames, so that a test can step
//! through the thread mesh and the backbone link in lockstep. Filters derived
//! with [`PacketFilter::filter`] start at the current position of their
//! parent and, when cascading, push every packet they find back up to it.

use crate::addrs::{EthAddr, ExtAddr, Ipv6Addr};
use crate::bytes::Bytes;
use crate::consts;
use crate::errors::VerifyError;
use crate::expr::{Expr, ExprError};
use crate::layer_fields;
use crate::packet::Packet;
use crate::value::{FieldValue, Vars};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::rc::Rc;
use tracing::{debug, error, trace};

use tracectl::trace_target;
trace_target!("packet-filter", LevelFilter::INFO, &["pktverify"]);

/// A position in the capture: the next 802.15.4 packet and the next ethernet
/// packet to look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PktIndex {
    pub wpan: usize,
    pub eth: usize,
}

impl PktIndex {
    #[must_use]
    pub const fn new(wpan: usize, eth: usize) -> Self {
        Self { wpan, eth }
    }

    /// Component-wise `<=`.
    #[must_use]
    pub fn le(&self, other: &PktIndex) -> bool {
        self.wpan <= other.wpan && self.eth <= other.eth
    }

    #[must_use]
    pub fn min(&self) -> usize {
        self.wpan.min(self.eth)
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.wpan.max(self.eth)
    }
}

impl Display for PktIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.wpan, self.eth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Medium {
    Wpan,
    Eth,
}

impl Medium {
    fn of(self, packet: &Packet) -> bool {
        match self {
            Medium::Wpan => packet.wpan(),
            Medium::Eth => packet.eth(),
        }
    }
}

/// Role announced by an MLE advertisement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum Role {
    Leader,
    Router,
    #[serde(rename = "REED")]
    #[strum(serialize = "REED")]
    Reed,
}

/// Identifies the seed of an MPL forwarded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MplSeed {
    /// The seed id is the given 16-bit value.
    Rloc16(u16),
    /// The packet was seeded by the owner of this RLOC: either it is the
    /// IPv6 source (and the seed id is elided), or the seed id is its RLOC16.
    Rloc(Ipv6Addr),
}

/// A packet found by a filter. Dereferences to the [`Packet`].
#[derive(Clone)]
pub struct PacketRef {
    pkts: Rc<[Packet]>,
    idx: usize,
}

impl PacketRef {
    /// Position of the packet in the capture.
    #[must_use]
    pub fn index(&self) -> usize {
        self.idx
    }
}

impl Deref for PacketRef {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.pkts[self.idx]
    }
}

impl Debug for PacketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&**self, f)
    }
}

impl Display for PacketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&**self, f)
    }
}

#[derive(Debug, Default)]
struct Cursor {
    index: PktIndex,
    last_index: Option<usize>,
}

type Predicate = Rc<dyn Fn(&Packet) -> bool>;

/// A filtered range of a capture with a movable cursor.
///
/// Clones share the cursor: moving one moves all of them.
#[derive(Clone)]
pub struct PacketFilter {
    pkts: Rc<[Packet]>,
    start: PktIndex,
    stop: PktIndex,
    cursor: Rc<RefCell<Cursor>>,
    pred: Option<Predicate>,
    parent: Option<Rc<PacketFilter>>,
}

impl Debug for PacketFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketFilter")
            .field("len", &self.pkts.len())
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("cursor", &self.cursor.borrow())
            .field("filtered", &self.pred.is_some())
            .field("cascade", &self.parent.is_some())
            .finish()
    }
}

/// Restores the index of a filter when dropped.
#[must_use = "the index is restored when the guard is dropped"]
pub struct SavedIndex {
    cursor: Rc<RefCell<Cursor>>,
    index: PktIndex,
}

impl SavedIndex {
    #[must_use]
    pub fn index(&self) -> PktIndex {
        self.index
    }
}

impl Drop for SavedIndex {
    fn drop(&mut self) {
        debug!("restoring index {}", self.index);
        self.cursor.borrow_mut().index = self.index;
    }
}

impl PacketFilter {
    /// A filter over the whole capture, accepting every packet.
    #[must_use]
    pub fn new(pkts: impl Into<Rc<[Packet]>>) -> Self {
        let pkts = pkts.into();
        let end = PktIndex::new(pkts.len(), pkts.len());
        Self::build(pkts, PktIndex::default(), end, None, None)
    }

    fn build(
        pkts: Rc<[Packet]>,
        start: PktIndex,
        stop: PktIndex,
        pred: Option<Predicate>,
        parent: Option<Rc<PacketFilter>>,
    ) -> Self {
        Self {
            pkts,
            start,
            stop,
            cursor: Rc::new(RefCell::new(Cursor {
                index: start,
                last_index: None,
            })),
            pred,
            parent,
        }
    }

    #[must_use]
    pub fn index(&self) -> PktIndex {
        self.cursor.borrow().index
    }

    /// Move the cursor.
    ///
    /// # Errors
    ///
    /// Fails if `index` is not within the range of this filter.
    pub fn set_index(&self, index: PktIndex) -> Result<(), VerifyError> {
        if !(self.start.le(&index) && index.le(&self.stop)) {
            return Err(VerifyError::IndexOutOfRange {
                index,
                start: self.start,
                stop: self.stop,
            });
        }
        debug!("set index {} => {index}", self.index());
        self.cursor.borrow_mut().index = index;
        Ok(())
    }

    #[must_use]
    pub fn start_index(&self) -> PktIndex {
        self.start
    }

    #[must_use]
    pub fn stop_index(&self) -> PktIndex {
        self.stop
    }

    /// Number of packets in the capture (not in the filtered range).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pkts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pkts.is_empty()
    }

    /// The packet at position `idx` of the capture.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Packet> {
        self.pkts.get(idx)
    }

    /// Every packet of the capture, regardless of range and predicates.
    pub fn iter(&self) -> std::slice::Iter<'_, Packet> {
        self.pkts.iter()
    }

    /// Position of the last packet found by this filter or a cascading child.
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.cursor.borrow().last_index
    }

    /// The last packet found by this filter or a cascading child.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifyError::PacketNotFound`] if nothing was found yet.
    pub fn last(&self) -> Result<PacketRef, VerifyError> {
        match self.last_index() {
            Some(idx) => Ok(self.packet_ref(idx)),
            None => Err(VerifyError::PacketNotFound {
                index: self.index(),
                stop: self.stop,
            }),
        }
    }

    /// Save the current index; it is restored when the guard is dropped.
    pub fn save_index(&self) -> SavedIndex {
        SavedIndex {
            cursor: self.cursor.clone(),
            index: self.index(),
        }
    }

    fn packet_ref(&self, idx: usize) -> PacketRef {
        PacketRef {
            pkts: self.pkts.clone(),
            idx,
        }
    }

    fn matches(&self, packet: &Packet) -> bool {
        self.pred.as_ref().is_none_or(|pred| pred(packet))
    }

    fn derive(&self, pred: Predicate, cascade: bool) -> PacketFilter {
        let index = self.index();
        debug!(
            "filtering in range {index}~{}{}",
            self.stop,
            if self.stop.max() == self.pkts.len() { " <end>" } else { " <stop>" }
        );
        let pred: Predicate = match &self.pred {
            None => pred,
            Some(old) => {
                let old = old.clone();
                Rc::new(move |p| old(p) && pred(p))
            }
        };
        let parent = cascade.then(|| Rc::new(self.clone()));
        Self::build(self.pkts.clone(), index, self.stop, Some(pred), parent)
    }

    /// A sub-filter from the current index to the stop index accepting the
    /// packets that match both this filter and `pred`. Packets it finds move
    /// this filter too.
    #[must_use]
    pub fn filter(&self, pred: impl Fn(&Packet) -> bool + 'static) -> PacketFilter {
        self.derive(Rc::new(pred), true)
    }

    /// Like [`PacketFilter::filter`], but the sub-filter moves on its own.
    #[must_use]
    pub fn filter_uncascaded(&self, pred: impl Fn(&Packet) -> bool + 'static) -> PacketFilter {
        self.derive(Rc::new(pred), false)
    }

    /// A cascading sub-filter accepting packets that match a filter expression.
    ///
    /// # Errors
    ///
    /// Fails if the expression does not compile.
    pub fn filter_expr(&self, source: &str, vars: &Vars) -> Result<PacketFilter, ExprError> {
        let expr = Expr::compile(source, vars)?;
        debug!("filter: {expr}");
        Ok(self.filter(move |p| expr.matches(p)))
    }

    /// A sub-filter with `pred` if `cond` holds, this filter otherwise.
    #[must_use]
    pub fn filter_if(&self, cond: bool, pred: impl Fn(&Packet) -> bool + 'static) -> PacketFilter {
        if cond {
            self.filter(pred)
        } else {
            self.clone()
        }
    }

    /// Find the next matching packet and move the cursor past it.
    ///
    /// The search covers every packet between the lower of the two cursors
    /// and the higher of the two stop indices; an 802.15.4 packet must also
    /// lie within the wpan cursor range and an ethernet packet within the eth
    /// cursor range.
    pub fn next(&self) -> Option<PacketRef> {
        let index = self.index();
        let stop = self.stop;

        for idx in index.min()..stop.max() {
            let Some(p) = self.pkts.get(idx) else {
                break;
            };
            trace!("probing #{}", p.number());
            if p.wpan() && !(index.wpan..stop.wpan).contains(&idx) {
                continue;
            }
            if p.eth() && !(index.eth..stop.eth).contains(&idx) {
                continue;
            }
            if self.matches(p) {
                self.on_found_next(idx, p, index);
                debug!("found packet #{}", p.number());
                return Some(self.packet_ref(idx));
            }
        }
        None
    }

    /// Like [`PacketFilter::next`], failing if no packet matches.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifyError::PacketNotFound`].
    pub fn must_next(&self) -> Result<PacketRef, VerifyError> {
        self.next().ok_or_else(|| VerifyError::PacketNotFound {
            index: self.index(),
            stop: self.stop,
        })
    }

    /// Check that no packet matches.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifyError::UnexpectedPacketFound`] after dumping the
    /// offending packet. The cursor has moved past it.
    pub fn must_not_next(&self) -> Result<(), VerifyError> {
        let index = self.index();
        match self.next() {
            None => Ok(()),
            Some(p) => {
                error!("found unexpected packet #{} searching from {index}", p.number());
                p.show();
                p.debug_fields();
                Err(VerifyError::UnexpectedPacketFound {
                    index,
                    number: p.number(),
                })
            }
        }
    }

    fn on_found_next(&self, idx: usize, p: &Packet, index: PktIndex) {
        let min_ts = p.sniff_timestamp() - consts::AUTO_SEEK_BACK_MAX_DURATION;
        let mut found = if p.wpan() {
            PktIndex::new(
                idx + 1,
                index.eth.max(self.find_prev_packet(idx + 1, min_ts, Medium::Eth)),
            )
        } else {
            PktIndex::new(
                index.wpan.max(self.find_prev_packet(idx + 1, min_ts, Medium::Wpan)),
                idx + 1,
            )
        };
        found.wpan = found.wpan.min(self.stop.wpan);
        found.eth = found.eth.min(self.stop.eth);

        debug!("found #{} at {idx}: index {index} => {found}", p.number());
        self.set_found_index(idx, found);
    }

    fn set_found_index(&self, last_index: usize, index: PktIndex) {
        {
            let mut cursor = self.cursor.borrow_mut();
            cursor.index = index;
            cursor.last_index = Some(last_index);
        }
        if let Some(parent) = &self.parent {
            parent.set_found_index(last_index, index);
        }
    }

    /// The earliest packet of `medium` before `idx` with a timestamp of at
    /// least `min_ts`, walking back over contiguous packets. Returns `idx`
    /// if there is none.
    fn find_prev_packet(&self, idx: usize, min_ts: f64, medium: Medium) -> usize {
        let mut prev = idx;
        let mut i = idx.min(self.pkts.len());
        while i > 0 && self.pkts[i - 1].sniff_timestamp() >= min_ts {
            i -= 1;
            if medium.of(&self.pkts[i]) {
                prev = i;
            }
        }
        prev
    }

    /// A sub-filter restricted to `start..stop` (`stop` defaults to the stop
    /// index of this filter), keeping the predicates.
    ///
    /// # Errors
    ///
    /// Fails if the range is not within the range of this filter.
    pub fn range(
        &self,
        start: PktIndex,
        stop: Option<PktIndex>,
        cascade: bool,
    ) -> Result<PacketFilter, VerifyError> {
        let stop = stop.unwrap_or(self.stop);
        for index in [start, stop] {
            if !(self.start.le(&index) && index.le(&self.stop)) {
                return Err(VerifyError::IndexOutOfRange {
                    index,
                    start: self.start,
                    stop: self.stop,
                });
            }
        }
        if !start.le(&stop) {
            return Err(VerifyError::IndexOutOfRange {
                index: start,
                start: self.start,
                stop,
            });
        }
        let parent = cascade.then(|| Rc::new(self.clone()));
        Ok(Self::build(self.pkts.clone(), start, stop, self.pred.clone(), parent))
    }

    /// An independent filter with the same predicates, starting at the
    /// current index.
    #[must_use]
    pub fn copy(&self) -> PacketFilter {
        Self::build(self.pkts.clone(), self.index(), self.stop, self.pred.clone(), None)
    }

    /// Move the selected cursors back to the earliest packet of their medium
    /// sent within `max_duration` seconds before the packet at the cursor.
    /// Cursors never move before the start index.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifyError::InvalidArgument`] if neither medium is
    /// selected.
    pub fn seek_back(&self, max_duration: f64, wpan: bool, eth: bool) -> Result<&Self, VerifyError> {
        if !wpan && !eth {
            return Err(VerifyError::InvalidArgument(
                "seek_back needs wpan or eth".to_string(),
            ));
        }
        let index = self.index();
        let mut back = index;
        if wpan && let Some(p) = self.pkts.get(index.wpan) {
            let min_ts = p.sniff_timestamp() - max_duration;
            back.wpan = self
                .find_prev_packet(index.wpan, min_ts, Medium::Wpan)
                .max(self.start.wpan);
        }
        if eth && let Some(p) = self.pkts.get(index.eth) {
            let min_ts = p.sniff_timestamp() - max_duration;
            back.eth = self
                .find_prev_packet(index.eth, min_ts, Medium::Eth)
                .max(self.start.eth);
        }
        debug!("back {max_duration} wpan={wpan}, eth={eth}: index {index} => {back}");
        self.cursor.borrow_mut().index = back;
        Ok(self)
    }
}

fn field_is(p: &Packet, uri: &str, value: &FieldValue) -> bool {
    p.field(uri).loose_eq(value)
}

fn int_is(p: &Packet, uri: &str, value: impl Into<i128>) -> bool {
    p.int(uri) == Some(value.into())
}

fn flag(p: &Packet, uri: &str) -> bool {
    p.field(uri).truthy()
}

/// Convenience filters. All of them cascade.
impl PacketFilter {
    #[must_use]
    pub fn filter_wpan(&self) -> PacketFilter {
        self.filter(Packet::wpan)
    }

    #[must_use]
    pub fn filter_wpan_ack(&self) -> PacketFilter {
        self.filter(|p| int_is(p, "wpan.frame_type", consts::MAC_FRAME_TYPE_ACK))
    }

    #[must_use]
    pub fn filter_wpan_beacon(&self) -> PacketFilter {
        self.filter(|p| int_is(p, "wpan.frame_type", consts::MAC_FRAME_TYPE_BEACON))
    }

    #[must_use]
    pub fn filter_wpan_data(&self) -> PacketFilter {
        self.filter(|p| int_is(p, "wpan.frame_type", consts::MAC_FRAME_TYPE_DATA))
    }

    /// MAC command frames with the given command id.
    #[must_use]
    pub fn filter_wpan_cmd(&self, cmd: u8) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.cmd", cmd))
    }

    #[must_use]
    pub fn filter_wpan_seq(&self, seq: u8) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.seq_no", seq))
    }

    #[must_use]
    pub fn filter_wpan_version(&self, version: u8) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.version", version))
    }

    #[must_use]
    pub fn filter_wpan_channel(&self, channel: u16) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.channel", channel))
    }

    #[must_use]
    pub fn filter_wpan_src16(&self, addr: u16) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.src16", addr))
    }

    #[must_use]
    pub fn filter_wpan_dst16(&self, addr: u16) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.dst16", addr))
    }

    #[must_use]
    pub fn filter_wpan_src16_dst16(&self, src: u16, dst: u16) -> PacketFilter {
        self.filter(move |p| int_is(p, "wpan.src16", src) && int_is(p, "wpan.dst16", dst))
    }

    #[must_use]
    pub fn filter_wpan_src64(&self, addr: ExtAddr) -> PacketFilter {
        self.filter(move |p| p.ext_addr("wpan.src64") == Some(addr))
    }

    #[must_use]
    pub fn filter_wpan_dst64(&self, addr: ExtAddr) -> PacketFilter {
        self.filter(move |p| p.ext_addr("wpan.dst64") == Some(addr))
    }

    /// Frames addressed to `rloc16`, either at the MAC layer or through the
    /// 6LoWPAN mesh header.
    #[must_use]
    pub fn filter_dst16(&self, rloc16: u16) -> PacketFilter {
        self.filter(move |p| {
            int_is(p, "lowpan.mesh.dest16", rloc16) || int_is(p, "wpan.dst16", rloc16)
        })
    }

    #[must_use]
    pub fn filter_wpan_ie_present(&self) -> PacketFilter {
        self.filter(|p| int_is(p, "wpan.ie_present", 1))
    }

    #[must_use]
    pub fn filter_wpan_ie_not_present(&self) -> PacketFilter {
        self.filter(|p| int_is(p, "wpan.ie_present", 0))
    }

    #[must_use]
    pub fn filter_eth(&self) -> PacketFilter {
        self.filter(Packet::eth)
    }

    #[must_use]
    pub fn filter_eth_src(&self, addr: EthAddr) -> PacketFilter {
        self.filter(move |p| p.eth_addr("eth.src") == Some(addr))
    }

    #[must_use]
    pub fn filter_ipv6_dst(&self, addr: Ipv6Addr) -> PacketFilter {
        self.filter(move |p| p.ipv6("ipv6.dst") == Some(addr))
    }

    #[must_use]
    pub fn filter_ipv6_2dsts(&self, addr1: Ipv6Addr, addr2: Ipv6Addr) -> PacketFilter {
        self.filter(move |p| {
            let dst = p.ipv6("ipv6.dst");
            dst == Some(addr1) || dst == Some(addr2)
        })
    }

    #[must_use]
    pub fn filter_ipv6_src_dst(&self, src: Ipv6Addr, dst: Ipv6Addr) -> PacketFilter {
        self.filter(move |p| p.ipv6("ipv6.src") == Some(src) && p.ipv6("ipv6.dst") == Some(dst))
    }

    /// Link-local all nodes (`ff02::1`).
    #[must_use]
    pub fn filter_ll_anma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::LINK_LOCAL_ALL_NODES_MULTICAST_ADDRESS)
    }

    /// Link-local all routers (`ff02::2`).
    #[must_use]
    pub fn filter_ll_arma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::LINK_LOCAL_ALL_ROUTERS_MULTICAST_ADDRESS)
    }

    /// Realm-local all nodes (`ff03::1`).
    #[must_use]
    pub fn filter_rl_anma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::REALM_LOCAL_ALL_NODES_ADDRESS)
    }

    /// Realm-local all routers (`ff03::2`).
    #[must_use]
    pub fn filter_rl_arma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::REALM_LOCAL_ALL_ROUTERS_ADDRESS)
    }

    #[must_use]
    pub fn filter_ll_atnma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::LINK_LOCAL_ALL_THREAD_NODES_MULTICAST_ADDRESS)
    }

    #[must_use]
    pub fn filter_rl_atnma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::REALM_LOCAL_ALL_THREAD_NODES_MULTICAST_ADDRESS)
    }

    #[must_use]
    pub fn filter_ll_abma(&self) -> PacketFilter {
        self.filter_ipv6_dst(consts::LINK_LOCAL_ALL_BBRS_MULTICAST_ADDRESS)
    }

    /// Packets to the all MPL forwarders address (`ff03::fc`), optionally
    /// restricted to a seed.
    #[must_use]
    pub fn filter_ampl_fma(&self, seed: Option<MplSeed>) -> PacketFilter {
        let f = self.filter_ipv6_dst(consts::ALL_MPL_FORWARDERS_MA);
        match seed {
            None => f,
            Some(MplSeed::Rloc16(seed_id)) => {
                let seed_id = Bytes::from(seed_id.to_be_bytes().to_vec());
                f.filter(move |p| p.bytes("ipv6.opt.mpl.seed_id").as_ref() == Some(&seed_id))
            }
            Some(MplSeed::Rloc(rloc)) => {
                let octets = rloc.octets();
                let rloc16 = Bytes::from(octets[14..].to_vec());
                f.filter(move |p| {
                    let from_seed = p.ipv6("ipv6.src") == Some(rloc);
                    if from_seed {
                        int_is(p, "ipv6.opt.mpl.flag.s", 0)
                    } else {
                        int_is(p, "ipv6.opt.mpl.flag.s", 1)
                            && p.bytes("ipv6.opt.mpl.seed_id").as_ref() == Some(&rloc16)
                    }
                })
            }
        }
    }

    #[must_use]
    pub fn filter_mle(&self) -> PacketFilter {
        self.filter(|p| p.has_layer("mle"))
    }

    #[must_use]
    pub fn filter_mle_cmd(&self, cmd: u8) -> PacketFilter {
        self.filter(move |p| int_is(p, "mle.cmd", cmd))
    }

    /// MLE messages carrying either command.
    #[must_use]
    pub fn filter_mle_cmd2(&self, cmd1: u8, cmd2: u8) -> PacketFilter {
        self.filter(move |p| {
            let cmd = p.int("mle.cmd");
            cmd == Some(cmd1.into()) || cmd == Some(cmd2.into())
        })
    }

    /// MLE messages carrying at least the given TLVs.
    #[must_use]
    pub fn filter_mle_has_tlv(&self, tlv_types: &[u8]) -> PacketFilter {
        let wanted: Vec<i128> = tlv_types.iter().copied().map(i128::from).collect();
        self.filter(move |p| {
            let present = p.ints("mle.tlv.type");
            wanted.iter().all(|t| present.contains(t))
        })
    }

    /// MLE advertisements to the link-local all nodes address with the TLVs
    /// expected from a node with the given role (and no others).
    #[must_use]
    pub fn filter_mle_advertisement(&self, role: Role) -> PacketFilter {
        let mut tlvs = vec![
            i128::from(consts::LEADER_DATA_TLV),
            i128::from(consts::SOURCE_ADDRESS_TLV),
        ];
        if role != Role::Reed {
            tlvs.push(i128::from(consts::ROUTE64_TLV));
        }
        let expected = FieldValue::set_of(tlvs.into_iter().map(FieldValue::Int));
        self.filter_ll_anma()
            .filter_mle_cmd(consts::MLE_ADVERTISEMENT)
            .filter(move |p| {
                p.field("mle.tlv.type").to_set().loose_eq(&expected) && int_is(p, "ipv6.hlim", 255)
            })
    }

    #[must_use]
    pub fn filter_coap(&self) -> PacketFilter {
        self.filter(|p| p.has_layer("coap"))
    }

    /// CoAP POST requests to `uri`.
    #[must_use]
    pub fn filter_coap_request(
        &self,
        uri: &str,
        port: Option<u16>,
        confirmable: Option<bool>,
    ) -> PacketFilter {
        let uri = FieldValue::from(uri);
        self.filter(move |p| {
            flag(p, "coap.is_post")
                && field_is(p, "coap.opt.uri_path_recon", &uri)
                && confirmable.is_none_or(|con| {
                    int_is(p, "coap.type", if con { consts::COAP_TYPE_CON } else { consts::COAP_TYPE_NON })
                })
                && port.is_none_or(|port| int_is(p, "udp.dstport", port))
        })
    }

    /// CoAP acknowledgements for `uri`.
    #[must_use]
    pub fn filter_coap_ack(&self, uri: &str, port: Option<u16>) -> PacketFilter {
        let uri = FieldValue::from(uri);
        self.filter(move |p| {
            flag(p, "coap.is_ack")
                && field_is(p, "coap.opt.uri_path_recon", &uri)
                && port.is_none_or(|port| int_is(p, "udp.dstport", port))
        })
    }

    /// Backbone answers (`/b/ba`) for `target`.
    #[must_use]
    pub fn filter_backbone_answer(
        &self,
        target: Ipv6Addr,
        eth_src: Option<EthAddr>,
        port: Option<u16>,
        confirmable: Option<bool>,
        mliid: Option<ExtAddr>,
    ) -> PacketFilter {
        let f = match eth_src {
            Some(src) => self.filter_eth_src(src),
            None => self.filter_eth(),
        };
        let f = f
            .filter_coap_request(consts::BACKBONE_ANSWER_URI, port, confirmable)
            .filter(move |p| p.ipv6("thread_bl.tlv.target_eid") == Some(target));
        match mliid {
            Some(mliid) => f.filter(move |p| p.ext_addr("thread_bl.tlv.ml_eid") == Some(mliid)),
            None => f,
        }
    }

    /// Non-confirmable backbone queries (`/b/bq`) for `target`.
    #[must_use]
    pub fn filter_backbone_query(
        &self,
        target: Ipv6Addr,
        eth_src: EthAddr,
        port: Option<u16>,
    ) -> PacketFilter {
        self.filter_eth_src(eth_src)
            .filter_coap_request(consts::BACKBONE_QUERY_URI, port, Some(false))
            .filter(move |p| p.ipv6("thread_bl.tlv.target_eid") == Some(target))
    }

    #[must_use]
    pub fn filter_ping_request(&self, identifier: Option<u16>) -> PacketFilter {
        self.filter(move |p| {
            flag(p, "icmpv6.is_ping_request")
                && identifier.is_none_or(|id| int_is(p, "icmpv6.echo.identifier", id))
        })
    }

    #[must_use]
    pub fn filter_ping_reply(&self, identifier: Option<u16>) -> PacketFilter {
        self.filter(move |p| {
            flag(p, "icmpv6.is_ping_reply")
                && identifier.is_none_or(|id| int_is(p, "icmpv6.echo.identifier", id))
        })
    }

    #[must_use]
    pub fn filter_icmpv6(&self) -> PacketFilter {
        self.filter(|p| p.has_layer("icmpv6"))
    }

    /// Neighbor solicitations for `target`.
    #[must_use]
    pub fn filter_icmpv6_nd_ns(&self, target: Ipv6Addr) -> PacketFilter {
        self.filter(move |p| {
            flag(p, "icmpv6.is_neighbor_solicitation")
                && p.ipv6("icmpv6.nd.ns.target_address") == Some(target)
        })
    }

    /// Neighbor advertisements for `target`.
    #[must_use]
    pub fn filter_icmpv6_nd_na(&self, target: Ipv6Addr) -> PacketFilter {
        self.filter(move |p| {
            flag(p, "icmpv6.is_neighbor_advertisement")
                && p.ipv6("icmpv6.nd.na.target_address") == Some(target)
        })
    }

    #[must_use]
    pub fn filter_icmpv6_nd_ra(&self) -> PacketFilter {
        self.filter(|p| flag(p, "icmpv6.is_router_advertisement"))
    }

    /// Network data carrying a backbone router service with its dataset.
    #[must_use]
    pub fn filter_has_bbr_dataset(&self) -> PacketFilter {
        self.filter(|p| {
            layer_fields::check_layer_field_has(p, "thread_nwd.tlv.server", "16").unwrap_or(false)
                && [
                    "thread_nwd.tlv.service.s_data.seqno",
                    "thread_nwd.tlv.service.s_data.rrdelay",
                    "thread_nwd.tlv.service.s_data.mlrtimeout",
                ]
                .iter()
                .all(|uri| !p.field(uri).is_null())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{Layer, RawField};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    /// Build a packet; each field lands in the layer named by its first
    /// path segment.
    fn pkt(idx: usize, ts: f64, medium: &str, fields: &[(&str, &str)]) -> Packet {
        let mut layers = vec![Layer::new(medium)];
        for &(uri, show) in fields {
            let name = uri.split('.').next().unwrap_or(uri);
            if !layers.iter().any(|l| l.name() == name) {
                layers.push(Layer::new(name));
            }
            let layer = layers.iter_mut().find(|l| l.name() == name).unwrap();
            layer.push(uri, RawField::new(show, None));
        }
        Packet::new(idx, idx + 1, ts, layers)
    }

    fn mle(idx: usize, ts: f64, cmd: &str) -> Packet {
        pkt(idx, ts, "wpan", &[("mle.cmd", cmd)])
    }

    fn eth(idx: usize, ts: f64) -> Packet {
        pkt(idx, ts, "eth", &[("eth.src", "02:00:00:00:00:01")])
    }

    /// wpan and eth packets interleaved in time.
    fn capture() -> PacketFilter {
        PacketFilter::new(vec![
            mle(0, 1.0, "9"),
            eth(1, 1.0),
            mle(2, 2.0, "11"),
            eth(3, 2.005),
            eth(4, 3.0),
        ])
    }

    #[test]
    fn next_moves_both_cursors() {
        let pkts = capture();
        let p = pkts.filter_mle_cmd(consts::MLE_CHILD_ID_REQUEST).must_next().unwrap();
        assert_eq!(p.index(), 2);
        assert_eq!(p.number(), 3);
        assert_eq!(pkts.index(), PktIndex::new(3, 3));
        assert_eq!(pkts.last_index(), Some(2));

        // the eth packet sent right after the wpan hit is still ahead
        let p = pkts.filter_eth().must_next().unwrap();
        assert_eq!(p.index(), 3);
        assert_eq!(pkts.index(), PktIndex::new(3, 4));
        assert_eq!(pkts.last().unwrap().index(), 3);
    }

    #[test]
    fn eth_hit_seeks_back_wpan_cursor() {
        let pkts = PacketFilter::new(vec![
            eth(0, 1.0),
            mle(1, 1.995, "9"),
            eth(2, 2.0),
            mle(3, 2.5, "10"),
        ]);
        pkts.filter_eth().must_next().unwrap();
        // no wpan packet in the window: the wpan cursor follows the hit
        assert_eq!(pkts.index(), PktIndex::new(1, 1));
        let p = pkts.filter_eth().must_next().unwrap();
        assert_eq!(p.index(), 2);
        // packet #2 was sent within the auto seek back window
        assert_eq!(pkts.index(), PktIndex::new(1, 3));
        assert_eq!(pkts.filter_mle().must_next().unwrap().index(), 1);
    }

    #[test]
    fn not_found() {
        let pkts = capture();
        let err = pkts.filter_mle_cmd(consts::MLE_ADVERTISEMENT).must_next().unwrap_err();
        assert_eq!(
            err,
            VerifyError::PacketNotFound {
                index: PktIndex::new(0, 0),
                stop: PktIndex::new(5, 5),
            }
        );
        assert_eq!(pkts.index(), PktIndex::new(0, 0));
        assert!(pkts.last().is_err());
    }

    #[test]
    #[traced_test]
    fn must_not_next() {
        let pkts = capture();
        assert!(pkts.filter_mle_cmd(consts::MLE_ADVERTISEMENT).must_not_next().is_ok());
        let err = pkts.filter_mle_cmd(consts::MLE_PARENT_REQUEST).must_not_next().unwrap_err();
        assert_eq!(
            err,
            VerifyError::UnexpectedPacketFound {
                index: PktIndex::new(0, 0),
                number: 1
            }
        );
        assert!(logs_contain("found unexpected packet #1"));
    }

    #[test]
    fn packets_out_of_cursor_range_are_skipped() {
        let pkts = capture();
        let f = pkts.range(PktIndex::new(0, 0), Some(PktIndex::new(2, 5)), true).unwrap();
        assert!(f.filter_mle_cmd(consts::MLE_CHILD_ID_REQUEST).next().is_none());
        // eth packets are still reachable
        assert_eq!(f.filter_eth().must_next().unwrap().index(), 1);
        assert_eq!(pkts.index(), PktIndex::new(0, 2));
    }

    #[test]
    fn save_index_restores() {
        let pkts = capture();
        {
            let saved = pkts.save_index();
            assert_eq!(saved.index(), PktIndex::new(0, 0));
            pkts.filter_eth().must_next().unwrap();
            pkts.filter_eth().must_next().unwrap();
            assert_ne!(pkts.index(), PktIndex::new(0, 0));
        }
        assert_eq!(pkts.index(), PktIndex::new(0, 0));
    }

    #[test]
    fn seek_back() {
        let pkts = capture();
        pkts.filter_mle_cmd(consts::MLE_CHILD_ID_REQUEST).must_next().unwrap();
        assert_eq!(pkts.index(), PktIndex::new(3, 3));
        pkts.seek_back(1.5, true, false).unwrap();
        assert_eq!(pkts.index(), PktIndex::new(0, 3));
        assert!(matches!(
            pkts.seek_back(1.0, false, false),
            Err(VerifyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn seek_back_stops_at_start() {
        let pkts = capture();
        let f = pkts.range(PktIndex::new(2, 2), None, false).unwrap();
        f.set_index(PktIndex::new(3, 3)).unwrap();
        f.seek_back(10.0, true, true).unwrap();
        assert_eq!(f.index(), PktIndex::new(2, 2));
    }

    #[test]
    fn cascading() {
        let pkts = capture();
        let copy = pkts.copy();
        copy.filter_eth().must_next().unwrap();
        assert_eq!(pkts.index(), PktIndex::new(0, 0));

        let uncascaded = pkts.filter_uncascaded(Packet::eth);
        uncascaded.must_next().unwrap();
        assert_eq!(pkts.index(), PktIndex::new(0, 0));
        assert_eq!(uncascaded.index(), PktIndex::new(0, 2));

        // grand children move every ancestor
        let child = pkts.filter_wpan();
        child.filter_mle_cmd(consts::MLE_CHILD_ID_REQUEST).must_next().unwrap();
        assert_eq!(child.index(), PktIndex::new(3, 3));
        assert_eq!(pkts.index(), PktIndex::new(3, 3));

        // children start at the current index of their parent
        assert!(pkts.filter_mle_cmd(consts::MLE_PARENT_REQUEST).next().is_none());
    }

    #[test]
    fn index_range_checks() {
        let pkts = capture();
        assert!(pkts.set_index(PktIndex::new(5, 5)).is_ok());
        assert!(matches!(
            pkts.set_index(PktIndex::new(6, 0)),
            Err(VerifyError::IndexOutOfRange { .. })
        ));
        pkts.set_index(PktIndex::new(1, 1)).unwrap();
        let f = pkts.filter_eth();
        assert_eq!(f.start_index(), PktIndex::new(1, 1));
        assert!(f.set_index(PktIndex::new(0, 1)).is_err());
        assert!(f.range(PktIndex::new(0, 0), None, true).is_err());
        assert!(
            pkts.range(PktIndex::new(4, 4), Some(PktIndex::new(3, 3)), true)
                .is_err()
        );
        assert_eq!(pkts.len(), 5);
        assert_eq!(pkts.iter().count(), 5);
        assert_eq!(pkts.get(4).map(Packet::number), Some(5));
    }

    #[test]
    fn filter_expressions() {
        let pkts = capture();
        let mut vars = Vars::new();
        vars.insert("CMD".into(), FieldValue::Int(11));
        let p = pkts
            .filter_expr("mle.cmd == {CMD}", &vars)
            .unwrap()
            .must_next()
            .unwrap();
        assert_eq!(p.index(), 2);
        assert!(pkts.filter_expr("mle.cmd == {NOPE}", &vars).is_err());
        assert!(pkts.filter_if(false, |_| false).next().is_some());
    }

    fn advertisement(tlvs: &[&str], hlim: &str) -> Packet {
        let mut fields = vec![
            ("ipv6.dst", "ff02::1"),
            ("ipv6.hlim", hlim),
            ("mle.cmd", "4"),
        ];
        fields.extend(tlvs.iter().map(|t| ("mle.tlv.type", *t)));
        pkt(0, 1.0, "wpan", &fields)
    }

    #[test]
    fn mle_advertisement() {
        let leader = PacketFilter::new(vec![advertisement(&["0", "11", "9"], "255")]);
        assert!(leader.copy().filter_mle_advertisement(Role::Leader).next().is_some());
        assert!(leader.copy().filter_mle_advertisement(Role::Reed).next().is_none());
        assert!(leader.copy().filter_mle_has_tlv(&[consts::ROUTE64_TLV]).next().is_some());

        let reed = PacketFilter::new(vec![advertisement(&["11", "0"], "255")]);
        assert!(reed.copy().filter_mle_advertisement(Role::Reed).next().is_some());
        assert!(reed.copy().filter_mle_advertisement(Role::Router).next().is_none());

        let low_hlim = PacketFilter::new(vec![advertisement(&["0", "11", "9"], "64")]);
        assert!(low_hlim.filter_mle_advertisement(Role::Router).next().is_none());
        assert_eq!("REED".parse::<Role>().unwrap(), Role::Reed);
    }

    #[test]
    fn mpl_seeds() {
        let rloc = Ipv6Addr::try_from("fd00::ff:fe00:400").unwrap();
        let seeded = pkt(
            0,
            1.0,
            "wpan",
            &[
                ("ipv6.src", "fd00::ff:fe00:400"),
                ("ipv6.dst", "ff03::fc"),
                ("ipv6.opt.mpl.flag.s", "0"),
            ],
        );
        let forwarded = pkt(
            1,
            1.0,
            "wpan",
            &[
                ("ipv6.src", "fd00::ff:fe00:800"),
                ("ipv6.dst", "ff03::fc"),
                ("ipv6.opt.mpl.flag.s", "1"),
                ("ipv6.opt.mpl.seed_id", "04:00"),
            ],
        );
        let pkts = PacketFilter::new(vec![seeded, forwarded]);
        let f = pkts.copy().filter_ampl_fma(Some(MplSeed::Rloc(rloc)));
        assert_eq!(f.must_next().unwrap().index(), 0);
        assert_eq!(f.must_next().unwrap().index(), 1);
        let f = pkts.copy().filter_ampl_fma(Some(MplSeed::Rloc16(0x0400)));
        assert_eq!(f.must_next().unwrap().index(), 1);
        let f = pkts.filter_ampl_fma(None);
        assert!(f.must_next().is_ok() && f.must_next().is_ok());
    }

    #[test]
    fn coap_requests() {
        let request = |idx, ty: &'static str| {
            pkt(
                idx,
                1.0,
                "wpan",
                &[
                    ("coap.code", "2"),
                    ("coap.type", ty),
                    ("coap.opt.uri_path_recon", "/a/as"),
                    ("udp.dstport", "61631"),
                ],
            )
        };
        let pkts = PacketFilter::new(vec![request(0, "1"), request(1, "0")]);
        let p = pkts
            .copy()
            .filter_coap_request(consts::ADDR_SOL_URI, Some(consts::TMF_PORT), Some(true))
            .must_next()
            .unwrap();
        assert_eq!(p.index(), 1);
        let p = pkts.copy().filter_coap_request(consts::ADDR_SOL_URI, None, None).must_next();
        assert_eq!(p.unwrap().index(), 0);
        assert!(pkts.copy().filter_coap_request("/a/ar", None, None).next().is_none());
        assert!(pkts.copy().filter_coap_ack(consts::ADDR_SOL_URI, None).next().is_none());
    }

    #[test]
    fn addressing_helpers() {
        let p = pkt(
            0,
            1.0,
            "wpan",
            &[
                ("wpan.dst16", "0xffff"),
                ("wpan.src16", "0x0400"),
                ("6lowpan.mesh.dest16", "0x0800"),
                ("wpan.ie_present", "1"),
            ],
        );
        let pkts = PacketFilter::new(vec![p]);
        assert!(pkts.copy().filter_dst16(0x0800).next().is_some());
        assert!(pkts.copy().filter_dst16(0xffff).next().is_some());
        assert!(pkts.copy().filter_dst16(0x0400).next().is_none());
        assert!(pkts.copy().filter_wpan_src16_dst16(0x0400, 0xffff).next().is_some());
        assert!(pkts.copy().filter_wpan_ie_present().next().is_some());
        assert!(pkts.copy().filter_wpan_ie_not_present().next().is_none());
    }

    #[test]
    fn ipv6_and_neighbor_discovery() {
        let nd = |idx: usize, ty: &str, kind: &str, target: &str| {
            let uri = format!("icmpv6.nd.{kind}.target_address");
            pkt(
                idx,
                1.0 + idx as f64,
                "eth",
                &[("ipv6.dst", "ff02::1:ff00:3"), ("icmpv6.type", ty), (uri.as_str(), target)],
            )
        };
        let pkts = PacketFilter::new(vec![
            nd(0, "135", "ns", "fd00::3"),
            nd(1, "136", "na", "fd00::4"),
            nd(2, "136", "na", "fd00::3"),
        ]);
        let target = Ipv6Addr::try_from("fd00::3").unwrap();
        assert_eq!(pkts.copy().filter_icmpv6_nd_ns(target).must_next().unwrap().index(), 0);
        assert_eq!(pkts.copy().filter_icmpv6_nd_na(target).must_next().unwrap().index(), 2);
        let other = Ipv6Addr::try_from("fd00::5").unwrap();
        assert!(pkts.copy().filter_icmpv6_nd_ns(other).next().is_none());

        let dst = Ipv6Addr::try_from("ff02::1:ff00:3").unwrap();
        assert_eq!(pkts.copy().filter_ipv6_2dsts(other, dst).must_next().unwrap().index(), 0);
        assert!(pkts.copy().filter_ipv6_2dsts(other, target).next().is_none());
    }

    #[test]
    fn backbone_query_and_answer() {
        const BR1: &str = "02:00:00:00:00:01";
        const BR2: &str = "02:00:00:00:00:02";
        const MLIID: &str = "11:22:33:44:55:66:77:88";
        let bl = |idx: usize, src: &str, ty: &str, uri: &str, ml_eid: Option<&str>| {
            let mut fields = vec![
                ("eth.src", src),
                ("coap.code", "2"),
                ("coap.type", ty),
                ("coap.opt.uri_path_recon", uri),
                ("udp.dstport", "61631"),
                ("thread_bl.tlv.target_eid", "fd00:7d03::1234"),
            ];
            fields.extend(ml_eid.map(|m| ("thread_bl.tlv.ml_eid", m)));
            pkt(idx, 1.0 + idx as f64, "eth", &fields)
        };
        let pkts = PacketFilter::new(vec![
            bl(0, BR1, "0", consts::BACKBONE_QUERY_URI, None),
            bl(1, BR1, "1", consts::BACKBONE_QUERY_URI, None),
            bl(2, BR2, "0", consts::BACKBONE_ANSWER_URI, Some("88:77:66:55:44:33:22:11")),
            bl(3, BR2, "0", consts::BACKBONE_ANSWER_URI, Some(MLIID)),
        ]);
        let target = Ipv6Addr::try_from("fd00:7d03::1234").unwrap();
        let br1 = EthAddr::try_from(BR1).unwrap();
        let br2 = EthAddr::try_from(BR2).unwrap();

        // queries are non-confirmable
        let p = pkts.copy().filter_backbone_query(target, br1, Some(consts::BB_PORT));
        assert_eq!(p.must_next().unwrap().index(), 1);
        assert!(pkts.copy().filter_backbone_query(target, br2, None).next().is_none());
        let elsewhere = Ipv6Addr::try_from("fd00:7d03::1").unwrap();
        assert!(pkts.copy().filter_backbone_query(elsewhere, br1, None).next().is_none());

        let answer = |eth_src, mliid| {
            pkts.copy()
                .filter_backbone_answer(target, eth_src, None, Some(true), mliid)
                .next()
                .map(|p| p.index())
        };
        assert_eq!(answer(None, None), Some(2));
        assert_eq!(answer(Some(br2), Some(ExtAddr::try_from(MLIID).unwrap())), Some(3));
        assert_eq!(answer(Some(br1), None), None);
        let unknown = ExtAddr::try_from("00:00:00:00:00:00:00:01").unwrap();
        assert_eq!(answer(None, Some(unknown)), None);
    }

    #[test]
    fn bbr_dataset() {
        let nwd = |idx: usize, fields: &[(&str, &str)]| {
            let mut mle = Layer::new("mle");
            mle.push("mle.cmd", RawField::new("0", None));
            for &(uri, show) in fields {
                mle.push(uri, RawField::new(show, None));
            }
            Packet::new(idx, idx + 1, 1.0 + idx as f64, vec![Layer::new("wpan"), mle])
        };
        let dataset = [
            ("thread_nwd.tlv.service.s_data.seqno", "1"),
            ("thread_nwd.tlv.service.s_data.rrdelay", "5"),
            ("thread_nwd.tlv.service.s_data.mlrtimeout", "3600"),
        ];
        let with_server = |idx, fields: &[(&'static str, &'static str)]| {
            let mut fields = fields.to_vec();
            fields.push(("thread_nwd.tlv.server_16", "1024"));
            nwd(idx, &fields)
        };
        let pkts = PacketFilter::new(vec![
            // no backbone router server
            nwd(0, &dataset),
            // incomplete dataset
            with_server(1, &dataset[..2]),
            with_server(2, &dataset),
        ]);
        assert_eq!(pkts.filter_has_bbr_dataset().must_next().unwrap().index(), 2);
        assert!(pkts.filter_has_bbr_dataset().next().is_none());
    }
}
