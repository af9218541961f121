// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Thread protocol constants used by the verification helpers.
//!
//! Every constant is also registered in a name table so that scenario files
//! and filter expressions can refer to them by name (see [`lookup`]).

use crate::addrs::Ipv6Addr;
use crate::value::FieldValue;

/// A named constant, as exposed to scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Named {
    Int(i128),
    Str(&'static str),
    Ipv6(Ipv6Addr),
}

impl From<Named> for FieldValue {
    fn from(value: Named) -> Self {
        match value {
            Named::Int(i) => FieldValue::Int(i),
            Named::Str(s) => FieldValue::from(s),
            Named::Ipv6(a) => FieldValue::Ipv6(a),
        }
    }
}

type NameTable = &'static [(&'static str, Named)];

macro_rules! int_consts {
    ($table:ident: $ty:ty; $( $(#[$meta:meta])* $name:ident = $value:expr ),* $(,)?) => {
        $( $(#[$meta])* pub const $name: $ty = $value; )*

        #[allow(clippy::cast_lossless)]
        const $table: NameTable = &[ $( (stringify!($name), Named::Int($name as i128)) ),* ];
    };
}

macro_rules! str_consts {
    ($table:ident; $( $(#[$meta:meta])* $name:ident = $value:expr ),* $(,)?) => {
        $( $(#[$meta])* pub const $name: &str = $value; )*

        const $table: NameTable = &[ $( (stringify!($name), Named::Str($name)) ),* ];
    };
}

macro_rules! addr_consts {
    ($table:ident; $( $(#[$meta:meta])* $name:ident = $value:expr ),* $(,)?) => {
        $( $(#[$meta])* pub const $name: Ipv6Addr = Ipv6Addr::from_segments($value); )*

        const $table: NameTable = &[ $( (stringify!($name), Named::Ipv6($name)) ),* ];
    };
}

int_consts! { MLE_COMMANDS: u8;
    MLE_LINK_REQUEST = 0,
    MLE_LINK_ACCEPT = 1,
    MLE_LINK_ACCEPT_AND_REQUEST = 2,
    MLE_LINK_REJECT = 3,
    MLE_ADVERTISEMENT = 4,
    MLE_UPDATE = 5,
    MLE_UPDATE_REQUEST = 6,
    MLE_DATA_REQUEST = 7,
    MLE_DATA_RESPONSE = 8,
    MLE_PARENT_REQUEST = 9,
    MLE_PARENT_RESPONSE = 10,
    MLE_CHILD_ID_REQUEST = 11,
    MLE_CHILD_ID_RESPONSE = 12,
    MLE_CHILD_UPDATE_REQUEST = 13,
    MLE_CHILD_UPDATE_RESPONSE = 14,
    MLE_ANNOUNCE = 15,
    MLE_DISCOVERY_REQUEST = 16,
    MLE_DISCOVERY_RESPONSE = 17,
    MLE_LINK_METRICS_MANAGEMENT_REQUEST = 18,
    MLE_LINK_METRICS_MANAGEMENT_RESPONSE = 19,
    MLE_LINK_PROBE = 20,
}

int_consts! { MLE_TLVS: u8;
    SOURCE_ADDRESS_TLV = 0,
    MODE_TLV = 1,
    TIMEOUT_TLV = 2,
    CHALLENGE_TLV = 3,
    RESPONSE_TLV = 4,
    LINK_LAYER_FRAME_COUNTER_TLV = 5,
    LINK_QUALITY_TLV = 6,
    NETWORK_PARAMETER_TLV = 7,
    MLE_FRAME_COUNTER_TLV = 8,
    ROUTE64_TLV = 9,
    ADDRESS16_TLV = 10,
    LEADER_DATA_TLV = 11,
    NETWORK_DATA_TLV = 12,
    TLV_REQUEST_TLV = 13,
    SCAN_MASK_TLV = 14,
    CONNECTIVITY_TLV = 15,
    LINK_MARGIN_TLV = 16,
    STATUS_TLV = 17,
    VERSION_TLV = 18,
    ADDRESS_REGISTRATION_TLV = 19,
    CHANNEL_TLV = 20,
    PANID_TLV = 21,
    ACTIVE_TIMESTAMP_TLV = 22,
    PENDING_TIMESTAMP_TLV = 23,
    ACTIVE_OPERATION_DATASET_TLV = 24,
    PENDING_OPERATION_DATASET_TLV = 25,
    THREAD_DISCOVERY_TLV = 26,
    CSL_SYNCHRONIZED_TIMEOUT = 85,
    CSL_CLOCK_ACCURACY = 86,
    LINK_METRICS_QUERY_TLV = 87,
    LINK_METRICS_MANAGEMENT_TLV = 88,
    LINK_METRICS_REPORT_TLV = 89,
    LINK_PROBE_TLV = 90,
}

int_consts! { NETWORK_DATA_TLVS: u8;
    NWD_HAS_ROUTER_TLV = 0,
    NWD_PREFIX_TLV = 1,
    NWD_BORDER_ROUTER_TLV = 2,
    NWD_LOWPAN_ID_TLV = 3,
    NWD_COMMISSIONING_DATA_TLV = 4,
    NWD_SERVICE_TLV = 5,
    NWD_SERVER_TLV = 6,
}

int_consts! { MESHCOP_TLVS: u8;
    NM_CHANNEL_TLV = 0,
    NM_PAN_ID_TLV = 1,
    NM_EXTENDED_PAN_ID_TLV = 2,
    NM_NETWORK_NAME_TLV = 3,
    NM_PSKC_TLV = 4,
    NM_NETWORK_KEY_TLV = 5,
    NM_NETWORK_KEY_SEQUENCE_COUNTER_TLV = 6,
    NM_NETWORK_MESH_LOCAL_PREFIX_TLV = 7,
    NM_STEERING_DATA_TLV = 8,
    NM_BORDER_AGENT_LOCATOR_TLV = 9,
    NM_COMMISSIONER_ID_TLV = 10,
    NM_COMMISSIONER_SESSION_ID_TLV = 11,
    NM_SECURITY_POLICY_TLV = 12,
    NM_GET_TLV = 13,
    NM_ACTIVE_TIMESTAMP_TLV = 14,
    NM_COMMISSIONER_UDP_PORT_TLV = 15,
    NM_STATE_TLV = 16,
    NM_JOINER_DTLS_ENCAPSULATION_TLV = 17,
    NM_JOINER_UDP_PORT_TLV = 18,
    NM_JOINER_IID_TLV = 19,
    NM_JOINER_ROUTER_LOCATOR_TLV = 20,
    NM_JOINER_ROUTER_KEK_TLV = 21,
    NM_PROVISIONING_URL_TLV = 32,
    NM_VENDOR_NAME_TLV = 33,
    NM_PENDING_TIMESTAMP_TLV = 51,
    NM_DELAY_TIMER_TLV = 52,
    NM_CHANNEL_MASK_TLV = 53,
    NM_COUNT_TLV = 54,
    NM_PERIOD_TLV = 55,
    NM_SCAN_DURATION_TLV = 56,
    NM_ENERGY_LIST_TLV = 57,
    NM_DISCOVERY_REQUEST_TLV = 128,
    NM_DISCOVERY_RESPONSE_TLV = 129,
}

int_consts! { ADDRESS_TLVS: u8;
    NL_TARGET_EID_TLV = 0,
    NL_MAC_EXTENDED_ADDRESS_TLV = 1,
    NL_RLOC16_TLV = 2,
    NL_ML_EID_TLV = 3,
    NL_STATUS_TLV = 4,
    NL_ATTACHED_TIME_TLV = 5,
    NL_LAST_TRANSACTION_TIME_TLV = 6,
    NL_ROUTER_MASK_TLV = 7,
    NL_ND_OPTION_TLV = 8,
    NL_ND_DATA_TLV = 9,
    NL_THREAD_NETWORK_DATA_TLV = 10,
    NL_TIMEOUT_TLV = 11,
    NL_THREAD_NETWORK_NAME_TLV = 12,
    NL_IPV6_ADDRESSES_TLV = 14,
    NL_COMMISSIONER_SESSION_ID_TLV = 15,
}

int_consts! { DIAG_TLVS: u8;
    DG_MAC_EXTENDED_ADDRESS_TLV = 0,
    DG_MAC_ADDRESS_TLV = 1,
    DG_MODE_TLV = 2,
    DG_TIMEOUT_TLV = 3,
    DG_CONNECTIVITY_TLV = 4,
    DG_ROUTE64_TLV = 5,
    DG_LEADER_DATA_TLV = 6,
    DG_NETWORK_DATA_TLV = 7,
    DG_IPV6_ADDRESS_LIST_TLV = 8,
    DG_MAC_COUNTERS_TLV = 9,
    DG_BATTERY_LEVEL_TLV = 14,
    DG_SUPPLY_VOLTAGE_TLV = 15,
    DG_CHILD_TABLE_TLV = 16,
    DG_CHANNEL_PAGES_TLV = 17,
    DG_TYPE_LIST_TLV = 18,
    DG_MAX_CHILD_TIMEOUT_TLV = 19,
}

int_consts! { MAC_FRAME_TYPES: u8;
    MAC_FRAME_TYPE_BEACON = 0,
    MAC_FRAME_TYPE_DATA = 1,
    MAC_FRAME_TYPE_ACK = 2,
    MAC_FRAME_TYPE_CMD = 3,
}

int_consts! { MAC_COMMANDS: u8;
    WPAN_DATA_REQUEST = 4,
}

int_consts! { COAP_CODES: u8;
    COAP_CODE_GET = 1,
    COAP_CODE_POST = 2,
    COAP_CODE_PUT = 3,
    COAP_CODE_DELETE = 4,
    COAP_CODE_ACK = 68,
    COAP_TYPE_CON = 0,
    COAP_TYPE_NON = 1,
    COAP_TYPE_ACK = 2,
    COAP_TYPE_RST = 3,
}

int_consts! { ICMPV6_TYPES: u8;
    ICMPV6_TYPE_DESTINATION_UNREACHABLE = 1,
    ICMPV6_TYPE_ECHO_REQUEST = 128,
    ICMPV6_TYPE_ECHO_REPLY = 129,
    ICMPV6_TYPE_MLD_QUERY = 130,
    ICMPV6_TYPE_ROUTER_SOLICITATION = 133,
    ICMPV6_TYPE_ROUTER_ADVERTISEMENT = 134,
    ICMPV6_TYPE_NEIGHBOR_SOLICITATION = 135,
    ICMPV6_TYPE_NEIGHBOR_ADVERTISEMENT = 136,
    ICMPV6_TYPE_MLDV2_REPORT = 143,
}

int_consts! { STATUS_CODES: u8;
    ADDR_SOL_SUCCESS = 0,
    ADDR_SOL_NA = 1,
    ST_MLR_SUCCESS = 0,
    ST_MLR_INVALID = 2,
    ST_MLR_NO_PERSISTENT = 3,
    ST_MLR_NO_RESOURCES = 4,
    ST_MLR_BBR_NOT_PRIMARY = 5,
    ST_MLR_GENERAL_FAILURE = 6,
    MESHCOP_ACCEPT = 1,
    MESHCOP_REJECT = 255,
}

int_consts! { PORTS: u16;
    MLE_PORT = 19788,
    TMF_PORT = 61631,
    BB_PORT = 61631,
    DEFAULT_BR_PORT = 49191,
    MDNS_PORT = 5353,
}

int_consts! { THREAD_VERSIONS: u8;
    THREAD_VERSION_1_1 = 2,
    THREAD_VERSION_1_2 = 3,
    THREAD_VERSION_1_3 = 4,
    THREAD_VERSION_1_4 = 5,
}

int_consts! { SERVICE_NUMBERS: u16;
    THREAD_ENTERPRISE_NUMBER = 44970,
    BACKBONE_ROUTER_SERVICE_DATA = 1,
    LEADER_ALOC = 0xfc00,
    ALOC16_SERVICE_START = 0xfc10,
}

str_consts! { URIS;
    ADDR_SOL_URI = "/a/as",
    ADDR_REL_URI = "/a/ar",
    ADDR_NTF_URI = "/a/an",
    ADDR_QRY_URI = "/a/aq",
    ADDR_ERR_URI = "/a/ae",
    SVR_DATA_URI = "/a/sd",
    MGMT_PANID_SCAN = "/c/pq",
    MGMT_PANID_CONFLICT = "/c/pc",
    MGMT_ED_SCAN = "/c/es",
    MGMT_ED_REPORT = "/c/er",
    MGMT_PENDING_SET_URI = "/c/ps",
    MGMT_ACTIVE_SET_URI = "/c/as",
    MGMT_ACTIVE_GET_URI = "/c/ag",
    MGMT_PENDING_GET_URI = "/c/pg",
    MGMT_COMMISSIONER_GET_URI = "/c/cg",
    MGMT_COMMISSIONER_SET_URI = "/c/cs",
    LEAD_PET_URI = "/c/lp",
    LEAD_KA_URI = "/c/la",
    MGMT_DATASET_CHANGED_URI = "/c/dc",
    RELAY_RX_URI = "/c/rx",
    RELAY_TX_URI = "/c/tx",
    DIAG_GET_URI = "/d/dg",
    DIAG_GET_QRY_URI = "/d/dq",
    DIAG_GET_ANS_URI = "/d/da",
    DIAG_RST_URI = "/d/dr",
    BACKBONE_QUERY_URI = "/b/bq",
    BACKBONE_ANSWER_URI = "/b/ba",
    BACKBONE_MLR_URI = "/b/bmr",
    MLR_URI = "/n/mr",
    DUA_REGISTRATION_URI = "/n/dr",
}

addr_consts! { MULTICAST_ADDRESSES;
    LINK_LOCAL_ALL_NODES_MULTICAST_ADDRESS = [0xff02, 0, 0, 0, 0, 0, 0, 1],
    LINK_LOCAL_ALL_ROUTERS_MULTICAST_ADDRESS = [0xff02, 0, 0, 0, 0, 0, 0, 2],
    REALM_LOCAL_ALL_NODES_ADDRESS = [0xff03, 0, 0, 0, 0, 0, 0, 1],
    REALM_LOCAL_ALL_ROUTERS_ADDRESS = [0xff03, 0, 0, 0, 0, 0, 0, 2],
    ALL_MPL_FORWARDERS_MA = [0xff03, 0, 0, 0, 0, 0, 0, 0xfc],
    LINK_LOCAL_ALL_THREAD_NODES_MULTICAST_ADDRESS = [0xff32, 0x40, 0xfd00, 0x0db8, 0, 0, 0, 1],
    REALM_LOCAL_ALL_THREAD_NODES_MULTICAST_ADDRESS = [0xff33, 0x40, 0xfd00, 0x0db8, 0, 0, 0, 1],
    LINK_LOCAL_ALL_BBRS_MULTICAST_ADDRESS = [0xff32, 0x40, 0xfd00, 0x0db8, 0, 0, 0, 3],
    REALM_LOCAL_ALL_BBRS_MULTICAST_ADDRESS = [0xff33, 0x40, 0xfd00, 0x0db8, 0, 0, 0, 3],
    DEFAULT_MESH_LOCAL_PREFIX = [0xfd00, 0x0db8, 0, 0, 0, 0, 0, 0],
}

/// How far back (in seconds) the other medium's cursor may be placed behind
/// a packet found by `next`.
pub const AUTO_SEEK_BACK_MAX_DURATION: f64 = 0.01;

/// Layer names the field registry knows about.
pub const VALID_LAYER_NAMES: &[&str] = &[
    "wpan",
    "wpan-tap",
    "mle",
    "coap",
    "thread_bcn",
    "thread_nm",
    "thread_meshcop",
    "thread_address",
    "thread_nwd",
    "thread_diagnostic",
    "thread_bl",
    "thread_bb",
    "6lowpan",
    "ipv6",
    "ip",
    "udp",
    "tcp",
    "eth",
    "icmpv6",
    "dtls",
    "dns",
    "mdns",
    "frame",
    "sll",
];

const TABLES: &[NameTable] = &[
    MLE_COMMANDS,
    MLE_TLVS,
    NETWORK_DATA_TLVS,
    MESHCOP_TLVS,
    ADDRESS_TLVS,
    DIAG_TLVS,
    MAC_FRAME_TYPES,
    MAC_COMMANDS,
    COAP_CODES,
    ICMPV6_TYPES,
    STATUS_CODES,
    PORTS,
    THREAD_VERSIONS,
    SERVICE_NUMBERS,
    URIS,
    MULTICAST_ADDRESSES,
];

/// Look up a constant by its name.
#[must_use]
pub fn lookup(name: &str) -> Option<Named> {
    TABLES
        .iter()
        .flat_map(|table| table.iter())
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

/// All registered constant names, in declaration order.
pub fn names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().flat_map(|table| table.iter()).map(|(n, _)| *n)
}

/// Human readable name of an MLE command, e.g. `Child ID Request`.
#[must_use]
pub fn mle_command_name(cmd: i128) -> Option<&'static str> {
    Some(match u8::try_from(cmd).ok()? {
        MLE_LINK_REQUEST => "Link Request",
        MLE_LINK_ACCEPT => "Link Accept",
        MLE_LINK_ACCEPT_AND_REQUEST => "Link Accept and Request",
        MLE_LINK_REJECT => "Link Reject",
        MLE_ADVERTISEMENT => "Advertisement",
        MLE_UPDATE => "Update",
        MLE_UPDATE_REQUEST => "Update Request",
        MLE_DATA_REQUEST => "Data Request",
        MLE_DATA_RESPONSE => "Data Response",
        MLE_PARENT_REQUEST => "Parent Request",
        MLE_PARENT_RESPONSE => "Parent Response",
        MLE_CHILD_ID_REQUEST => "Child ID Request",
        MLE_CHILD_ID_RESPONSE => "Child ID Response",
        MLE_CHILD_UPDATE_REQUEST => "Child Update Request",
        MLE_CHILD_UPDATE_RESPONSE => "Child Update Response",
        MLE_ANNOUNCE => "Announce",
        MLE_DISCOVERY_REQUEST => "Discovery Request",
        MLE_DISCOVERY_RESPONSE => "Discovery Response",
        MLE_LINK_METRICS_MANAGEMENT_REQUEST => "Link Metrics Management Request",
        MLE_LINK_METRICS_MANAGEMENT_RESPONSE => "Link Metrics Management Response",
        MLE_LINK_PROBE => "Link Probe",
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn lookup_by_name() {
        assert_eq!(lookup("MLE_CHILD_ID_REQUEST"), Some(Named::Int(11)));
        assert_eq!(lookup("ROUTE64_TLV"), Some(Named::Int(9)));
        assert_eq!(lookup("ADDR_SOL_URI"), Some(Named::Str("/a/as")));
        assert_eq!(
            lookup("LINK_LOCAL_ALL_NODES_MULTICAST_ADDRESS"),
            Some(Named::Ipv6(Ipv6Addr::try_from("ff02::1").unwrap()))
        );
        assert_eq!(lookup("NO_SUCH_CONSTANT"), None);
    }

    #[test]
    fn thread_multicast_addresses() {
        assert_eq!(
            LINK_LOCAL_ALL_THREAD_NODES_MULTICAST_ADDRESS.to_string(),
            "ff32:40:fd00:db8::1"
        );
        assert_eq!(ALL_MPL_FORWARDERS_MA.to_string(), "ff03::fc");
        assert!(REALM_LOCAL_ALL_BBRS_MULTICAST_ADDRESS.is_realm_local_multicast());
    }

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for name in names() {
            assert!(seen.insert(name), "duplicate constant name {name}");
        }
    }

    #[test]
    fn command_names() {
        assert_eq!(mle_command_name(11), Some("Child ID Request"));
        assert_eq!(mle_command_name(99), None);
        assert_eq!(mle_command_name(-1), None);
    }
}
