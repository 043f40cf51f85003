/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Linux joystick (`/dev/input/jsN`) event decoding.
//!
//! Every event is an 8-byte record:
//!
//! ```text
//! u32 time_ms | i16 value | u8 type | u8 number
//! ```
//!
//! `type` carries `0x01` for buttons, `0x02` for axes, and `0x80` on the
//! synthetic events the driver emits right after open to report the initial
//! state.  `number` is the slot on the device, not the `linux/input.h` code;
//! the slot → code table is the device layout ([`DeviceLayout`]).

use serde::Deserialize;

pub const EVENT_LEN: usize = 8;

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

/// Full-scale axis magnitude reported by the driver.
pub const AXIS_FULL_SCALE: i32 = 32_767;

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Button,
    Axis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time_ms: u32,
    pub value: i16,
    pub kind: EventKind,
    /// Axis or button slot on the device.
    pub number: u8,
    /// Synthetic initial-state event.
    pub initial: bool,
}

impl JsEvent {
    /// Decode one record.  Returns `None` for event types this bridge does
    /// not handle.
    pub fn decode(buf: &[u8; EVENT_LEN]) -> Option<Self> {
        let time_ms = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let value = i16::from_le_bytes([buf[4], buf[5]]);
        let ty = buf[6];
        let kind = match ty & !JS_EVENT_INIT {
            JS_EVENT_BUTTON => EventKind::Button,
            JS_EVENT_AXIS => EventKind::Axis,
            _ => return None,
        };
        Some(Self {
            time_ms,
            value,
            kind,
            number: buf[7],
            initial: ty & JS_EVENT_INIT != 0,
        })
    }
}

// ── Event codes (linux/input.h) ───────────────────────────────────────────────

/// Absolute-axis codes (`ABS_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisCode {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
    Throttle,
    Rudder,
    Wheel,
    Gas,
    Brake,
    Hat0x,
    Hat0y,
    Hat1x,
    Hat1y,
    Hat2x,
    Hat2y,
    Hat3x,
    Hat3y,
    Pressure,
    Distance,
    TiltX,
    TiltY,
    ToolWidth,
    Volume,
    Misc,
}

impl AxisCode {
    pub fn from_raw(code: u16) -> Option<Self> {
        use AxisCode::*;
        Some(match code {
            0x00 => X,
            0x01 => Y,
            0x02 => Z,
            0x03 => Rx,
            0x04 => Ry,
            0x05 => Rz,
            0x06 => Throttle,
            0x07 => Rudder,
            0x08 => Wheel,
            0x09 => Gas,
            0x0a => Brake,
            0x10 => Hat0x,
            0x11 => Hat0y,
            0x12 => Hat1x,
            0x13 => Hat1y,
            0x14 => Hat2x,
            0x15 => Hat2y,
            0x16 => Hat3x,
            0x17 => Hat3y,
            0x18 => Pressure,
            0x19 => Distance,
            0x1a => TiltX,
            0x1b => TiltY,
            0x1c => ToolWidth,
            0x20 => Volume,
            0x28 => Misc,
            _ => return None,
        })
    }
}

/// Button codes (`BTN_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonCode {
    Trigger,
    Thumb,
    Thumb2,
    Top,
    Top2,
    Pinkie,
    Base,
    Base2,
    Base3,
    Base4,
    Base5,
    Base6,
    Dead,
    A,
    B,
    C,
    X,
    Y,
    Z,
    Tl,
    Tr,
    Tl2,
    Tr2,
    Select,
    Start,
    Mode,
    Thumbl,
    Thumbr,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl ButtonCode {
    pub fn from_raw(code: u16) -> Option<Self> {
        use ButtonCode::*;
        Some(match code {
            0x120 => Trigger,
            0x121 => Thumb,
            0x122 => Thumb2,
            0x123 => Top,
            0x124 => Top2,
            0x125 => Pinkie,
            0x126 => Base,
            0x127 => Base2,
            0x128 => Base3,
            0x129 => Base4,
            0x12a => Base5,
            0x12b => Base6,
            0x12f => Dead,
            0x130 => A,
            0x131 => B,
            0x132 => C,
            0x133 => X,
            0x134 => Y,
            0x135 => Z,
            0x136 => Tl,
            0x137 => Tr,
            0x138 => Tl2,
            0x139 => Tr2,
            0x13a => Select,
            0x13b => Start,
            0x13c => Mode,
            0x13d => Thumbl,
            0x13e => Thumbr,
            0x220 => DpadUp,
            0x221 => DpadDown,
            0x222 => DpadLeft,
            0x223 => DpadRight,
            // Xbox 360 pads report the d-pad as trigger-happy buttons
            0x2c0 => DpadLeft,
            0x2c1 => DpadRight,
            0x2c2 => DpadUp,
            0x2c3 => DpadDown,
            _ => return None,
        })
    }
}

// ── Device layout ─────────────────────────────────────────────────────────────

/// Slot → code tables of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    pub axes: Vec<AxisCode>,
    pub buttons: Vec<ButtonCode>,
}

impl DeviceLayout {
    /// Layout reported by the `xpad` driver for Xbox 360 controllers.
    pub fn xpad() -> Self {
        use AxisCode as A;
        use ButtonCode as B;
        Self {
            axes: vec![A::X, A::Y, A::Z, A::Rx, A::Ry, A::Rz, A::Hat0x, A::Hat0y],
            buttons: vec![
                B::A,
                B::B,
                B::X,
                B::Y,
                B::Tl,
                B::Tr,
                B::Select,
                B::Start,
                B::Mode,
                B::Thumbl,
                B::Thumbr,
            ],
        }
    }

    pub fn axis_slot(&self, code: AxisCode) -> Option<usize> {
        self.axes.iter().position(|&a| a == code)
    }

    pub fn button_slot(&self, code: ButtonCode) -> Option<usize> {
        self.buttons.iter().position(|&b| b == code)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time_ms: u32, value: i16, ty: u8, number: u8) -> [u8; EVENT_LEN] {
        let mut buf = [0u8; EVENT_LEN];
        buf[0..4].copy_from_slice(&time_ms.to_le_bytes());
        buf[4..6].copy_from_slice(&value.to_le_bytes());
        buf[6] = ty;
        buf[7] = number;
        buf
    }

    #[test]
    fn decodes_axis_event() {
        let ev = JsEvent::decode(&record(1234, -16_000, 0x02, 3)).unwrap();
        assert_eq!(ev.time_ms, 1234);
        assert_eq!(ev.value, -16_000);
        assert_eq!(ev.kind, EventKind::Axis);
        assert_eq!(ev.number, 3);
        assert!(!ev.initial);
    }

    #[test]
    fn decodes_initial_button_event() {
        let ev = JsEvent::decode(&record(0, 1, 0x81, 0)).unwrap();
        assert_eq!(ev.kind, EventKind::Button);
        assert!(ev.initial);
    }

    #[test]
    fn unknown_event_type_is_skipped() {
        assert!(JsEvent::decode(&record(0, 0, 0x04, 0)).is_none());
        assert!(JsEvent::decode(&record(0, 0, 0x80, 0)).is_none());
    }

    #[test]
    fn raw_codes_resolve_to_closed_enums() {
        assert_eq!(AxisCode::from_raw(0x04), Some(AxisCode::Ry));
        assert_eq!(AxisCode::from_raw(0x11), Some(AxisCode::Hat0y));
        assert_eq!(AxisCode::from_raw(0x0b), None);

        assert_eq!(ButtonCode::from_raw(0x130), Some(ButtonCode::A));
        assert_eq!(ButtonCode::from_raw(0x13e), Some(ButtonCode::Thumbr));
        assert_eq!(ButtonCode::from_raw(0x12c), None);
    }

    #[test]
    fn xbox360_dpad_codes_alias_standard_dpad() {
        assert_eq!(ButtonCode::from_raw(0x2c0), Some(ButtonCode::DpadLeft));
        assert_eq!(ButtonCode::from_raw(0x2c2), Some(ButtonCode::DpadUp));
        assert_eq!(ButtonCode::from_raw(0x221), Some(ButtonCode::DpadDown));
    }

    #[test]
    fn xpad_layout_slots() {
        let layout = DeviceLayout::xpad();
        assert_eq!(layout.axis_slot(AxisCode::Rx), Some(3));
        assert_eq!(layout.axis_slot(AxisCode::Throttle), None);
        assert_eq!(layout.button_slot(ButtonCode::Start), Some(7));
    }
}
