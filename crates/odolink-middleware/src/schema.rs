//! Positional field catalog of the controller's telemetry frame.
//!
//! A frame is not self-describing: the N-th value on the wire belongs to the
//! N-th name in [`FIELD_NAMES`] (sentinels excluded).  Each name also
//! carries a [`CoercionRule`] that decides how its raw text is converted.
//! Rules are derived once when the schema is built.

use std::sync::LazyLock;

/// Leading frame sentinel, including its delimiter.
pub const BEGIN_SENTINEL: &str = "BEGIN;";

/// Trailing frame sentinel, including its delimiter.
pub const END_SENTINEL: &str = ";END";

/// Number of value fields between the sentinels.
pub const FIELD_COUNT: usize = 34;

/// Full wire order, sentinels included.
pub const FIELD_NAMES: [&str; FIELD_COUNT + 2] = [
    "BEGIN",
    "PROTOCOL_VERSION",
    "getEllapsedTime",
    "BMS_ChargeDischargeCycle",
    "FixedValue1",
    "FixedValue2",
    "FixedValue3",
    "BMS_Pressure",
    "BMS_SOC",
    "adVoltageInt",
    "BMS_Current_mA",
    "inputCurrent",
    "ChargerConnected",
    "PositionActual1",
    "PositionActual2",
    "DeltaTimeOdometry",
    "FixedValue4",
    "leftEncoderSensor1NbPulsesNow",
    "rightEncoderSensor1NbPulsesNow",
    "shortLeftEncoderNbPulsesNow",
    "shortRightEncoderNbPulsesNow",
    "leftSpeed_act",
    "rightSpeed_act",
    "currentSensorMotorLeftAverage",
    "currentSensorMotorRightAverage",
    "odom_x2",
    "odom_y2",
    "odom_th2",
    "odom_vx2",
    "odom_vth2",
    "NumberOfReceivedConfigs",
    "odom_x3",
    "odom_y3",
    "odom_th3",
    "BMS_EXT_SOC",
    "externalAdVoltageInt",
    "END",
];

/// How a field's raw token is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoercionRule {
    Integer,
    Decimal,
    /// No conversion; the token is kept as text.
    OpaqueString,
}

impl CoercionRule {
    /// Derive the rule for `name`.  Checked in order, first match wins.
    pub fn for_field(name: &str) -> Self {
        if matches!(name, "ChargerConnected" | "NumberOfReceivedConfigs") {
            return CoercionRule::Integer;
        }
        if name.starts_with("FixedValue")
            || name.contains("Encoder")
            || name.contains("PositionActual")
            || name.contains("DeltaTimeOdometry")
        {
            return CoercionRule::Integer;
        }
        if name.ends_with("_mA") || name.ends_with("Int") {
            return CoercionRule::Integer;
        }
        if name == "PROTOCOL_VERSION" {
            return CoercionRule::OpaqueString;
        }
        CoercionRule::Decimal
    }
}

/// One value slot of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: CoercionRule,
}

/// The ordered value slots between the sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

static STANDARD: LazyLock<FieldSchema> = LazyLock::new(|| FieldSchema {
    fields: FIELD_NAMES[1..=FIELD_COUNT]
        .iter()
        .map(|&name| FieldSpec {
            name,
            rule: CoercionRule::for_field(name),
        })
        .collect(),
});

impl FieldSchema {
    /// The controller's telemetry schema.
    pub fn standard() -> &'static FieldSchema {
        &STANDARD
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rule of `name`, or `None` if the schema has no such field.
    pub fn rule(&self, name: &str) -> Option<CoercionRule> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.rule)
    }

    /// Position of `name` among the value slots.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}
