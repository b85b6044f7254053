//! Frame descriptors: `(node_type, node_index, message_type)` triples, emitted as plain
//! constants from a small table rather than reproduced via generic/template metaprogramming
//! (`SPEC_FULL.md` §9 design note on compile-time frame descriptors).

use pm1_common::consts::{
    ANY_INDEX, MSG_ECU_CLEAR, MSG_ECU_CURRENT_POSITION, MSG_ECU_CURRENT_SPEED,
    MSG_ECU_TARGET_SPEED, MSG_ECU_TIMEOUT, MSG_STATE, MSG_TCU_CURRENT_POSITION,
    MSG_TCU_CURRENT_SPEED, MSG_TCU_TARGET_POSITION, NODE_TYPE_ECU, NODE_TYPE_TCU,
};

/// Identifies a message by its three wire-level coordinates.
///
/// `node_index == ANY_INDEX` is a wildcard **only when used as a match pattern** — never as
/// the index baked into an outgoing frame (a descriptor used to build an outbound frame must
/// carry a concrete index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub node_type: u8,
    pub node_index: u8,
    pub message_type: u8,
}

impl Descriptor {
    pub const fn new(node_type: u8, node_index: u8, message_type: u8) -> Self {
        Self {
            node_type,
            node_index,
            message_type,
        }
    }

    /// Does `other` (decoded from a wire frame) satisfy this descriptor, honouring the
    /// wildcard index?
    pub fn matches(&self, other: &Descriptor) -> bool {
        self.node_type == other.node_type
            && self.message_type == other.message_type
            && (self.node_index == ANY_INDEX || self.node_index == other.node_index)
    }
}

/// ECU (drive wheel) descriptors, parameterised by node index (0 = left, 1 = right).
pub mod ecu {
    use super::*;

    pub const fn target_speed(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_ECU_TARGET_SPEED)
    }
    pub const fn current_speed(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_ECU_CURRENT_SPEED)
    }
    pub const fn current_position(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_ECU_CURRENT_POSITION)
    }
    pub const fn clear(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_ECU_CLEAR)
    }
    pub const fn timeout(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_ECU_TIMEOUT)
    }
    pub const fn state(index: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, index, MSG_STATE)
    }
    pub const fn broadcast(message_type: u8) -> Descriptor {
        Descriptor::new(NODE_TYPE_ECU, ANY_INDEX, message_type)
    }

    pub const LEFT: u8 = 0;
    pub const RIGHT: u8 = 1;
}

/// TCU (rudder) descriptors. The chassis has a single rudder node, always index 0.
pub mod tcu {
    use super::*;

    pub const INDEX: u8 = 0;

    pub const fn target_position() -> Descriptor {
        Descriptor::new(NODE_TYPE_TCU, INDEX, MSG_TCU_TARGET_POSITION)
    }
    pub const fn current_position() -> Descriptor {
        Descriptor::new(NODE_TYPE_TCU, INDEX, MSG_TCU_CURRENT_POSITION)
    }
    pub const fn current_speed() -> Descriptor {
        Descriptor::new(NODE_TYPE_TCU, INDEX, MSG_TCU_CURRENT_SPEED)
    }
    pub const fn state() -> Descriptor {
        Descriptor::new(NODE_TYPE_TCU, INDEX, MSG_STATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_index_matches_any_concrete_index() {
        let pattern = ecu::broadcast(MSG_ECU_CURRENT_POSITION);
        assert!(pattern.matches(&ecu::current_position(ecu::LEFT)));
        assert!(pattern.matches(&ecu::current_position(ecu::RIGHT)));
    }

    #[test]
    fn concrete_index_does_not_match_other_index() {
        let left = ecu::current_position(ecu::LEFT);
        let right = ecu::current_position(ecu::RIGHT);
        assert!(!left.matches(&right));
    }

    #[test]
    fn node_type_mismatch_never_matches() {
        assert!(!ecu::state(0).matches(&tcu::state()));
    }
}
