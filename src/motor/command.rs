// Drive commands sent to the motor controller
//
// Wire format: two bytes, [opcode, argument].

use serde::Serialize;

const OP_STOP: u8 = 0x00;
const OP_FORWARD: u8 = 0x01;
const OP_REVERSE: u8 = 0x02;
const OP_STATUS: u8 = 0x7F;

/// Status codes carried by a status command
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    CourseComplete = 0x01,
    Aborted = 0x02,
    BusFault = 0xE0,
    SensorFault = 0xE1,
}

impl StatusCode {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::CourseComplete),
            0x02 => Some(Self::Aborted),
            0xE0 => Some(Self::BusFault),
            0xE1 => Some(Self::SensorFault),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Stop,
    Forward(u8),
    Reverse(u8),
    Status(StatusCode),
}

impl DriveCommand {
    pub fn encode(self) -> [u8; 2] {
        match self {
            Self::Stop => [OP_STOP, 0],
            Self::Forward(speed) => [OP_FORWARD, speed],
            Self::Reverse(speed) => [OP_REVERSE, speed],
            Self::Status(code) => [OP_STATUS, code as u8],
        }
    }

    pub fn decode(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [OP_STOP, _] => Some(Self::Stop),
            [OP_FORWARD, speed] => Some(Self::Forward(speed)),
            [OP_REVERSE, speed] => Some(Self::Reverse(speed)),
            [OP_STATUS, code] => StatusCode::from_byte(code).map(Self::Status),
            _ => None,
        }
    }

    /// True if the command leaves the wheels turning
    pub fn is_motion(self) -> bool {
        matches!(self, Self::Forward(s) | Self::Reverse(s) if s > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding() {
        assert_eq!(DriveCommand::Stop.encode(), [0x00, 0x00]);
        assert_eq!(DriveCommand::Forward(64).encode(), [0x01, 64]);
        assert_eq!(DriveCommand::Reverse(96).encode(), [0x02, 96]);
        assert_eq!(
            DriveCommand::Status(StatusCode::BusFault).encode(),
            [0x7F, 0xE0]
        );
    }

    #[test]
    fn test_decode_rejects_unknown() {
        assert_eq!(DriveCommand::decode([0x03, 0]), None);
        assert_eq!(DriveCommand::decode([0x7F, 0x55]), None);
        assert_eq!(
            DriveCommand::decode([0x7F, 0x01]),
            Some(DriveCommand::Status(StatusCode::CourseComplete))
        );
    }

    #[test]
    fn test_is_motion() {
        assert!(DriveCommand::Forward(1).is_motion());
        assert!(!DriveCommand::Forward(0).is_motion());
        assert!(!DriveCommand::Stop.is_motion());
        assert!(!DriveCommand::Status(StatusCode::Aborted).is_motion());
    }

    #[test]
    fn test_serializes_as_snake_case() {
        let json = serde_json::to_string(&DriveCommand::Forward(32)).unwrap();
        assert_eq!(json, r#"{"forward":32}"#);
        let json = serde_json::to_string(&DriveCommand::Status(StatusCode::BusFault)).unwrap();
        assert_eq!(json, r#"{"status":"bus_fault"}"#);
    }
}
