// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address types seen in Thread captures: IEEE 802.15.4 extended addresses,
//! ethernet addresses of backbone links and IPv6 addresses with the
//! Thread-specific classifications the verification helpers rely on.

use arrayvec::ArrayVec;
use std::fmt::Display;
use std::str::FromStr;

/// Errors which can occur while converting a string to one of the address types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrParseError {
    #[error("invalid extended address: {0}")]
    ExtAddr(String),
    #[error("invalid ethernet address: {0}")]
    EthAddr(String),
    #[error("invalid IPv6 address: {0}")]
    Ipv6(String),
    #[error("invalid IPv6 prefix: {0}")]
    Ipv6Prefix(String),
}

/// Parse `N` octets written either as `N` colon (or dash) separated hex pairs
/// or as `2 * N` contiguous hex digits, with an optional `0x` prefix.
fn parse_octets<const N: usize>(value: &str) -> Option<[u8; N]> {
    let value = value.trim();
    let value = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    let octets = if value.contains([':', '-']) {
        value
            .split([':', '-'])
            .try_fold(ArrayVec::<u8, N>::new(), |mut acc, octet| {
                if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                acc.try_push(u8::from_str_radix(octet, 16).ok()?).ok()?;
                Some(acc)
            })?
    } else {
        if value.len() != 2 * N || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        (0..N)
            .map(|i| u8::from_str_radix(&value[2 * i..2 * i + 2], 16))
            .collect::<Result<ArrayVec<u8, N>, _>>()
            .ok()?
    };
    octets.into_inner().ok()
}

/// An IEEE 802.15.4 extended (64-bit) address.
#[repr(transparent)]
#[cfg_attr(test, derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ExtAddr(pub [u8; 8]);

impl ExtAddr {
    /// The link-local IPv6 address derived from this extended address
    /// (universal/local bit flipped).
    #[must_use]
    pub fn link_local(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets[0] = 0xfe;
        octets[1] = 0x80;
        octets[8..].copy_from_slice(&self.0);
        octets[8] ^= 0x02;
        Ipv6Addr::from(octets)
    }
}

impl From<[u8; 8]> for ExtAddr {
    fn from(value: [u8; 8]) -> Self {
        ExtAddr(value)
    }
}

impl From<u64> for ExtAddr {
    fn from(value: u64) -> Self {
        ExtAddr(value.to_be_bytes())
    }
}

impl From<ExtAddr> for u64 {
    fn from(value: ExtAddr) -> Self {
        u64::from_be_bytes(value.0)
    }
}

impl TryFrom<&str> for ExtAddr {
    type Error = AddrParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        parse_octets::<8>(value)
            .map(ExtAddr)
            .ok_or_else(|| AddrParseError::ExtAddr(value.to_string()))
    }
}

impl TryFrom<String> for ExtAddr {
    type Error = AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ExtAddr::try_from(value.as_str())
    }
}

impl FromStr for ExtAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtAddr::try_from(s)
    }
}

impl From<ExtAddr> for String {
    fn from(value: ExtAddr) -> Self {
        value.to_string()
    }
}

impl Display for ExtAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5], o[6], o[7]
        )
    }
}

/// An ethernet (48-bit) address of a backbone interface.
#[repr(transparent)]
#[cfg_attr(test, derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddr(pub [u8; 6]);

impl EthAddr {
    /// Returns true iff the least significant bit of the first octet is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl From<[u8; 6]> for EthAddr {
    fn from(value: [u8; 6]) -> Self {
        EthAddr(value)
    }
}

impl TryFrom<&str> for EthAddr {
    type Error = AddrParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        parse_octets::<6>(value)
            .map(EthAddr)
            .ok_or_else(|| AddrParseError::EthAddr(value.to_string()))
    }
}

impl TryFrom<String> for EthAddr {
    type Error = AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EthAddr::try_from(value.as_str())
    }
}

impl FromStr for EthAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EthAddr::try_from(s)
    }
}

impl From<EthAddr> for String {
    fn from(value: EthAddr) -> Self {
        value.to_string()
    }
}

impl Display for EthAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// An IPv6 address.
///
/// Wraps [`std::net::Ipv6Addr`] and adds the classifications used by Thread
/// tests: link-local, multicast scopes, RLOC/ALOC interface identifiers and
/// membership in a mesh-local prefix.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Ipv6Addr(std::net::Ipv6Addr);

/// The interface identifier prefix shared by RLOC and ALOC addresses.
const LOCATOR_IID: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xfe, 0x00];

/// First RLOC16 value reserved for anycast locators.
const ALOC16_MIN: u16 = 0xfc00;
const ALOC16_MAX: u16 = 0xfcff;

impl Ipv6Addr {
    #[must_use]
    pub const fn new(addr: std::net::Ipv6Addr) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn from_segments(s: [u16; 8]) -> Self {
        Self(std::net::Ipv6Addr::new(
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
        ))
    }

    #[must_use]
    pub const fn inner(&self) -> std::net::Ipv6Addr {
        self.0
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    #[must_use]
    pub fn is_link_local(&self) -> bool {
        let o = self.octets();
        o[0] == 0xfe && o[1] & 0xc0 == 0x80
    }

    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0.is_multicast()
    }

    /// The multicast scope nibble, if this is a multicast address.
    #[must_use]
    pub fn multicast_scope(&self) -> Option<u8> {
        self.is_multicast().then(|| self.octets()[1] & 0x0f)
    }

    #[must_use]
    pub fn is_link_local_multicast(&self) -> bool {
        self.multicast_scope() == Some(2)
    }

    #[must_use]
    pub fn is_realm_local_multicast(&self) -> bool {
        self.multicast_scope() == Some(3)
    }

    /// The 64-bit interface identifier.
    #[must_use]
    pub fn iid(&self) -> [u8; 8] {
        let mut iid = [0u8; 8];
        iid.copy_from_slice(&self.octets()[8..]);
        iid
    }

    fn locator16(&self) -> Option<u16> {
        let o = self.octets();
        (o[8..14] == LOCATOR_IID).then(|| u16::from_be_bytes([o[14], o[15]]))
    }

    /// Returns true iff the interface identifier is a routing locator.
    #[must_use]
    pub fn is_rloc(&self) -> bool {
        self.locator16().is_some_and(|r| r < ALOC16_MIN)
    }

    /// Returns true iff the interface identifier is an anycast locator.
    #[must_use]
    pub fn is_aloc(&self) -> bool {
        self.locator16().is_some_and(|r| (ALOC16_MIN..=ALOC16_MAX).contains(&r))
    }

    /// The RLOC16 embedded in a routing or anycast locator.
    #[must_use]
    pub fn rloc16(&self) -> Option<u16> {
        self.locator16()
    }

    /// Returns true iff the upper 64 bits match the given /64 prefix.
    #[must_use]
    pub fn in_prefix64(&self, prefix: &Ipv6Addr) -> bool {
        self.octets()[..8] == prefix.octets()[..8]
    }

    #[must_use]
    pub fn is_mesh_local(&self, mesh_local_prefix: &Ipv6Addr) -> bool {
        self.in_prefix64(mesh_local_prefix)
    }

    /// Domain unicast address: inside the Thread domain prefix.
    #[must_use]
    pub fn is_dua(&self, domain_prefix: &Ipv6Prefix) -> bool {
        domain_prefix.contains(self)
    }

    /// Global unicast address on the backbone link.
    #[must_use]
    pub fn is_backbone_gua(&self, backbone_prefix: &Ipv6Prefix) -> bool {
        !self.is_multicast() && !self.is_link_local() && backbone_prefix.contains(self)
    }

    /// Returns true iff the address lives in the given mesh-local prefix and
    /// is neither an RLOC nor an ALOC, i.e. it is an ML-EID.
    #[must_use]
    pub fn is_mleid(&self, mesh_local_prefix: &Ipv6Addr) -> bool {
        self.in_prefix64(mesh_local_prefix) && self.locator16().is_none()
    }

    /// Build a locator address from a /64 prefix and an RLOC16.
    #[must_use]
    pub fn locator(prefix: &Ipv6Addr, rloc16: u16) -> Ipv6Addr {
        let mut o = [0u8; 16];
        o[..8].copy_from_slice(&prefix.octets()[..8]);
        o[8..14].copy_from_slice(&LOCATOR_IID);
        o[14..].copy_from_slice(&rloc16.to_be_bytes());
        Ipv6Addr::from(o)
    }
}

impl From<std::net::Ipv6Addr> for Ipv6Addr {
    fn from(value: std::net::Ipv6Addr) -> Self {
        Self(value)
    }
}

impl From<[u8; 16]> for Ipv6Addr {
    fn from(value: [u8; 16]) -> Self {
        Self(std::net::Ipv6Addr::from(value))
    }
}

impl From<Ipv6Addr> for std::net::Ipv6Addr {
    fn from(value: Ipv6Addr) -> Self {
        value.0
    }
}

impl TryFrom<&str> for Ipv6Addr {
    type Error = AddrParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse::<std::net::Ipv6Addr>()
            .map(Ipv6Addr)
            .map_err(|_| AddrParseError::Ipv6(value.to_string()))
    }
}

impl FromStr for Ipv6Addr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv6Addr::try_from(s)
    }
}

impl Display for Ipv6Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An IPv6 prefix such as `fd00:db8::/64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv6Prefix {
    addr: Ipv6Addr,
    len: u8,
}

impl Ipv6Prefix {
    /// Create a prefix, masking out host bits.
    ///
    /// # Errors
    ///
    /// Fails if `len` is larger than 128.
    pub fn new(addr: Ipv6Addr, len: u8) -> Result<Self, AddrParseError> {
        if len > 128 {
            return Err(AddrParseError::Ipv6Prefix(format!("{addr}/{len}")));
        }
        let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
        let masked = u128::from_be_bytes(addr.octets()) & mask;
        Ok(Self {
            addr: Ipv6Addr::from(masked.to_be_bytes()),
            len,
        })
    }

    #[must_use]
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    #[must_use]
    pub fn len(&self) -> u8 {
        self.len
    }

    #[must_use]
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        Ipv6Prefix::new(*addr, self.len).is_ok_and(|p| p.addr == self.addr)
    }
}

impl TryFrom<&str> for Ipv6Prefix {
    type Error = AddrParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let err = || AddrParseError::Ipv6Prefix(value.to_string());
        let (addr, len) = value.trim().split_once('/').ok_or_else(err)?;
        let addr = Ipv6Addr::try_from(addr).map_err(|_| err())?;
        let len = len.parse::<u8>().map_err(|_| err())?;
        Ipv6Prefix::new(addr, len).map_err(|_| err())
    }
}

impl TryFrom<String> for Ipv6Prefix {
    type Error = AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ipv6Prefix::try_from(value.as_str())
    }
}

impl From<Ipv6Prefix> for String {
    fn from(value: Ipv6Prefix) -> Self {
        value.to_string()
    }
}

impl Display for Ipv6Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ext_addr_accepts_both_notations() {
        let a = ExtAddr::try_from("16:6e:0a:00:00:00:00:01").unwrap();
        let b = ExtAddr::try_from("166e0a0000000001").unwrap();
        let c = ExtAddr::try_from("0x166e0a0000000001").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(u64::from(a), 0x166e_0a00_0000_0001);
        assert_eq!(a.to_string(), "16:6e:0a:00:00:00:00:01");
    }

    #[test]
    fn ext_addr_rejects_garbage() {
        assert!(ExtAddr::try_from("16:6e:0a").is_err());
        assert!(ExtAddr::try_from("16:6e:0a:00:00:00:00:01:02").is_err());
        assert!(ExtAddr::try_from("zz6e0a0000000001").is_err());
        assert!(ExtAddr::try_from("").is_err());
    }

    #[test]
    fn ext_addr_display_parse_contract() {
        bolero::check!()
            .with_type()
            .for_each(|addr: &ExtAddr| {
                assert_eq!(ExtAddr::try_from(addr.to_string().as_str()).unwrap(), *addr);
            });
    }

    #[test]
    fn eth_addr_display_parse_contract() {
        bolero::check!()
            .with_type()
            .for_each(|addr: &EthAddr| {
                assert_eq!(EthAddr::try_from(addr.to_string().as_str()).unwrap(), *addr);
            });
    }

    #[test]
    fn link_local_from_ext_addr() {
        let ext = ExtAddr::try_from("16:6e:0a:00:00:00:00:01").unwrap();
        let lla = ext.link_local();
        assert_eq!(lla.to_string(), "fe80::146e:a00:0:1");
        assert!(lla.is_link_local());
    }

    #[test]
    fn locator_classification() {
        let rloc = Ipv6Addr::try_from("fd00:db8::ff:fe00:400").unwrap();
        assert!(rloc.is_rloc());
        assert!(!rloc.is_aloc());
        assert_eq!(rloc.rloc16(), Some(0x0400));

        let aloc = Ipv6Addr::try_from("fd00:db8::ff:fe00:fc00").unwrap();
        assert!(aloc.is_aloc());
        assert!(!aloc.is_rloc());
        let aloc = Ipv6Addr::try_from("fd00:db8::ff:fe00:fcff").unwrap();
        assert!(aloc.is_aloc());

        // reserved locators are neither
        let reserved = Ipv6Addr::try_from("fd00:db8::ff:fe00:fd00").unwrap();
        assert!(!reserved.is_aloc());
        assert!(!reserved.is_rloc());

        let ml_prefix = Ipv6Addr::try_from("fd00:db8::").unwrap();
        let mleid = Ipv6Addr::try_from("fd00:db8::1234:5678:9abc:def0").unwrap();
        assert!(mleid.is_mleid(&ml_prefix));
        assert!(!rloc.is_mleid(&ml_prefix));
        assert_eq!(Ipv6Addr::locator(&ml_prefix, 0x0400), rloc);
    }

    #[test]
    fn multicast_scopes() {
        let ll = Ipv6Addr::try_from("ff02::1").unwrap();
        let rl = Ipv6Addr::try_from("ff03::fc").unwrap();
        let uni = Ipv6Addr::try_from("fe80::1").unwrap();
        assert!(ll.is_link_local_multicast());
        assert!(rl.is_realm_local_multicast());
        assert_eq!(uni.multicast_scope(), None);
    }

    #[test]
    fn prefix_parse_and_contains() {
        let prefix = Ipv6Prefix::try_from("fd00:7d03:7d03:7d03::/64").unwrap();
        assert_eq!(prefix.len(), 64);
        assert!(prefix.contains(&Ipv6Addr::try_from("fd00:7d03:7d03:7d03::1").unwrap()));
        assert!(!prefix.contains(&Ipv6Addr::try_from("fd00:db8::1").unwrap()));
        assert!(Ipv6Addr::try_from("fd00:7d03:7d03:7d03::1").unwrap().is_dua(&prefix));
        let backbone = Ipv6Prefix::try_from("2001:db8:1::/64").unwrap();
        assert!(Ipv6Addr::try_from("2001:db8:1::5").unwrap().is_backbone_gua(&backbone));
        assert!(!Ipv6Addr::try_from("fe80::5").unwrap().is_backbone_gua(&backbone));
        assert!(Ipv6Prefix::try_from("fd00::/129").is_err());
        assert!(Ipv6Prefix::try_from("fd00::").is_err());
    }
}
