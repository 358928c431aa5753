//! Typed field edits.
//!
//! Every editable field of a [`Control`] or [`ControlLink`] has exactly one
//! variant here. Applying an edit is an exhaustive match, so there is no
//! "unknown key" path at apply time. The wire names (`name`,
//! `link_netProbability`, `_linkId`, ...) survive only at the edges, through
//! [`ControlField::key`], [`LinkField::key`] and [`ChangeSet::to_value_map`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};
use crate::ids::{LinkId, UserId};
use crate::model::{Control, ControlLink, ControlType, TestFrequency};
use crate::score::Score;

/// Key under which the owning link id travels next to `link_*` fields.
pub const LINK_ID_KEY: &str = "_linkId";

// ── Control fields ──────────────────────────────────────────────────────

/// Editable fields of a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlField {
    Name,
    Description,
    ControlType,
    NetProbability,
    NetImpact,
    #[serde(rename = "assignedTesterId")]
    AssignedTester,
    TestFrequency,
    TestProcedure,
    Comment,
}

impl ControlField {
    pub const ALL: [ControlField; 9] = [
        Self::Name,
        Self::Description,
        Self::ControlType,
        Self::NetProbability,
        Self::NetImpact,
        Self::AssignedTester,
        Self::TestFrequency,
        Self::TestProcedure,
        Self::Comment,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::ControlType => "controlType",
            Self::NetProbability => "netProbability",
            Self::NetImpact => "netImpact",
            Self::AssignedTester => "assignedTesterId",
            Self::TestFrequency => "testFrequency",
            Self::TestProcedure => "testProcedure",
            Self::Comment => "comment",
        }
    }

    pub fn from_key(key: &str) -> ModelResult<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .ok_or_else(|| ModelError::UnknownField(key.to_string()))
    }

    /// Whether an edit to this field changes aggregation inputs.
    pub fn affects_score(self) -> bool {
        matches!(self, Self::NetProbability | Self::NetImpact)
    }

    /// The control's live value for this field, as an edit.
    pub fn current(self, control: &Control) -> ControlEdit {
        match self {
            Self::Name => ControlEdit::Name(control.name.clone()),
            Self::Description => ControlEdit::Description(control.description.clone()),
            Self::ControlType => ControlEdit::ControlType(control.control_type),
            Self::NetProbability => ControlEdit::NetProbability(control.net_probability),
            Self::NetImpact => ControlEdit::NetImpact(control.net_impact),
            Self::AssignedTester => ControlEdit::AssignedTester(control.assigned_tester_id.clone()),
            Self::TestFrequency => ControlEdit::TestFrequency(control.test_frequency),
            Self::TestProcedure => ControlEdit::TestProcedure(control.test_procedure.clone()),
            Self::Comment => ControlEdit::Comment(control.comment.clone()),
        }
    }

    /// Parse text typed into an input bound to this field.
    pub fn parse_edit(self, text: &str) -> ModelResult<ControlEdit> {
        let blank = text.trim().is_empty();
        Ok(match self {
            Self::Name => {
                if blank {
                    return Err(ModelError::InvalidValue {
                        field: self.key().into(),
                        value: text.to_string(),
                    });
                }
                ControlEdit::Name(text.trim().to_string())
            }
            Self::Description => ControlEdit::Description(text.to_string()),
            Self::ControlType => ControlEdit::ControlType(text.parse()?),
            Self::NetProbability => {
                ControlEdit::NetProbability(Score::parse_optional(self.key(), text)?)
            }
            Self::NetImpact => ControlEdit::NetImpact(Score::parse_optional(self.key(), text)?),
            Self::AssignedTester => {
                ControlEdit::AssignedTester((!blank).then(|| UserId::new(text.trim())))
            }
            Self::TestFrequency => {
                ControlEdit::TestFrequency(if blank { None } else { Some(text.parse()?) })
            }
            Self::TestProcedure => ControlEdit::TestProcedure(text.to_string()),
            Self::Comment => ControlEdit::Comment(text.to_string()),
        })
    }
}

impl std::fmt::Display for ControlField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A new value for one control field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ControlEdit {
    Name(String),
    Description(String),
    ControlType(ControlType),
    NetProbability(Option<Score>),
    NetImpact(Option<Score>),
    #[serde(rename = "assignedTesterId")]
    AssignedTester(Option<UserId>),
    TestFrequency(Option<TestFrequency>),
    TestProcedure(String),
    Comment(String),
}

impl ControlEdit {
    pub fn field(&self) -> ControlField {
        match self {
            Self::Name(_) => ControlField::Name,
            Self::Description(_) => ControlField::Description,
            Self::ControlType(_) => ControlField::ControlType,
            Self::NetProbability(_) => ControlField::NetProbability,
            Self::NetImpact(_) => ControlField::NetImpact,
            Self::AssignedTester(_) => ControlField::AssignedTester,
            Self::TestFrequency(_) => ControlField::TestFrequency,
            Self::TestProcedure(_) => ControlField::TestProcedure,
            Self::Comment(_) => ControlField::Comment,
        }
    }

    pub fn apply(&self, control: &mut Control) {
        match self {
            Self::Name(v) => control.name = v.clone(),
            Self::Description(v) => control.description = v.clone(),
            Self::ControlType(v) => control.control_type = *v,
            Self::NetProbability(v) => control.net_probability = *v,
            Self::NetImpact(v) => control.net_impact = *v,
            Self::AssignedTester(v) => control.assigned_tester_id = v.clone(),
            Self::TestFrequency(v) => control.test_frequency = *v,
            Self::TestProcedure(v) => control.test_procedure = v.clone(),
            Self::Comment(v) => control.comment = v.clone(),
        }
    }

    /// JSON rendering of the carried value.
    pub fn value(&self) -> Value {
        match self {
            Self::Name(v) | Self::Description(v) | Self::TestProcedure(v) | Self::Comment(v) => {
                Value::String(v.clone())
            }
            Self::ControlType(v) => Value::String(v.as_str().to_string()),
            Self::NetProbability(v) | Self::NetImpact(v) => score_value(*v),
            Self::AssignedTester(v) => v
                .as_ref()
                .map_or(Value::Null, |u| Value::String(u.0.clone())),
            Self::TestFrequency(v) => v
                .map_or(Value::Null, |f| Value::String(f.as_str().to_string())),
        }
    }
}

// ── Link fields ─────────────────────────────────────────────────────────

/// Per-relationship override fields of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkField {
    #[serde(rename = "link_netProbability")]
    NetProbability,
    #[serde(rename = "link_netImpact")]
    NetImpact,
}

impl LinkField {
    pub const ALL: [LinkField; 2] = [Self::NetProbability, Self::NetImpact];

    pub fn key(self) -> &'static str {
        match self {
            Self::NetProbability => "link_netProbability",
            Self::NetImpact => "link_netImpact",
        }
    }

    pub fn from_key(key: &str) -> ModelResult<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .ok_or_else(|| ModelError::UnknownField(key.to_string()))
    }

    pub fn current(self, link: &ControlLink) -> LinkEdit {
        match self {
            Self::NetProbability => LinkEdit::NetProbability(link.net_probability),
            Self::NetImpact => LinkEdit::NetImpact(link.net_impact),
        }
    }

    pub fn parse_edit(self, text: &str) -> ModelResult<LinkEdit> {
        let score = Score::parse_optional(self.key(), text)?;
        Ok(match self {
            Self::NetProbability => LinkEdit::NetProbability(score),
            Self::NetImpact => LinkEdit::NetImpact(score),
        })
    }
}

impl std::fmt::Display for LinkField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A new override value on a link. `None` clears the override so the
/// control's default shows through again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum LinkEdit {
    #[serde(rename = "link_netProbability")]
    NetProbability(Option<Score>),
    #[serde(rename = "link_netImpact")]
    NetImpact(Option<Score>),
}

impl LinkEdit {
    pub fn field(&self) -> LinkField {
        match self {
            Self::NetProbability(_) => LinkField::NetProbability,
            Self::NetImpact(_) => LinkField::NetImpact,
        }
    }

    pub fn apply(&self, link: &mut ControlLink) {
        match self {
            Self::NetProbability(v) => link.net_probability = *v,
            Self::NetImpact(v) => link.net_impact = *v,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            Self::NetProbability(v) | Self::NetImpact(v) => score_value(*v),
        }
    }
}

// ── Change sets ─────────────────────────────────────────────────────────

/// Override edits bound to the link they target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkChange {
    pub link_id: LinkId,
    pub edits: Vec<LinkEdit>,
}

impl LinkChange {
    pub fn apply(&self, link: &mut ControlLink) {
        for edit in &self.edits {
            edit.apply(link);
        }
    }
}

/// A batch of edits against one control and, optionally, one of its links.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(default)]
    pub control: Vec<ControlEdit>,
    #[serde(default)]
    pub link: Option<LinkChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.link.as_ref().map_or(true, |l| l.edits.is_empty())
    }

    pub fn control_only(edits: Vec<ControlEdit>) -> Self {
        Self {
            control: edits,
            link: None,
        }
    }

    pub fn apply_to_control(&self, control: &mut Control) {
        for edit in &self.control {
            edit.apply(control);
        }
    }

    pub fn control_edit(&self, field: ControlField) -> Option<&ControlEdit> {
        self.control.iter().find(|e| e.field() == field)
    }

    pub fn link_edit(&self, field: LinkField) -> Option<&LinkEdit> {
        self.link
            .as_ref()
            .and_then(|l| l.edits.iter().find(|e| e.field() == field))
    }

    /// The tester being assigned, if this change assigns one.
    pub fn assigned_tester(&self) -> Option<&UserId> {
        match self.control_edit(ControlField::AssignedTester) {
            Some(ControlEdit::AssignedTester(Some(user))) => Some(user),
            _ => None,
        }
    }

    pub fn affects_score(&self) -> bool {
        self.control.iter().any(|e| e.field().affects_score())
            || self.link.as_ref().map_or(false, |l| !l.edits.is_empty())
    }

    /// Wire keys of every edited field, control fields first.
    pub fn field_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.control.iter().map(|e| e.field().key()).collect();
        if let Some(link) = &self.link {
            keys.extend(link.edits.iter().map(|e| e.field().key()));
        }
        keys
    }

    /// Flat `{field: value}` map as the reviewing workflow displays it.
    pub fn to_value_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for edit in &self.control {
            map.insert(edit.field().key().to_string(), edit.value());
        }
        if let Some(link) = &self.link {
            for edit in &link.edits {
                map.insert(edit.field().key().to_string(), edit.value());
            }
            map.insert(LINK_ID_KEY.to_string(), Value::String(link.link_id.0.clone()));
        }
        map
    }
}

fn score_value(score: Option<Score>) -> Value {
    score.map_or(Value::Null, |s| Value::from(s.value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: u8) -> Option<Score> {
        Some(Score::new(v).unwrap())
    }

    #[test]
    fn every_field_round_trips_through_its_key() {
        for field in ControlField::ALL {
            assert_eq!(ControlField::from_key(field.key()).unwrap(), field);
        }
        for field in LinkField::ALL {
            assert_eq!(LinkField::from_key(field.key()).unwrap(), field);
        }
        assert!(ControlField::from_key("link_netImpact").is_err());
    }

    #[test]
    fn apply_updates_only_the_named_field() {
        let mut control = Control::new("Reconcile ledger", ControlType::Detective);
        ControlEdit::Comment("monthly".into()).apply(&mut control);
        ControlEdit::NetImpact(s(3)).apply(&mut control);

        assert_eq!(control.comment, "monthly");
        assert_eq!(control.net_impact, s(3));
        assert_eq!(control.name, "Reconcile ledger");
    }

    #[test]
    fn current_reads_live_value() {
        let control = Control::new("Reconcile ledger", ControlType::Detective).with_scores(s(2), None);
        assert_eq!(
            ControlField::NetProbability.current(&control),
            ControlEdit::NetProbability(s(2))
        );
        assert_eq!(
            ControlField::ControlType.current(&control),
            ControlEdit::ControlType(ControlType::Detective)
        );
    }

    #[test]
    fn parse_edit_validates_input() {
        assert!(ControlField::Name.parse_edit("   ").is_err());
        assert!(ControlField::NetProbability.parse_edit("8").is_err());
        assert_eq!(
            ControlField::AssignedTester.parse_edit("").unwrap(),
            ControlEdit::AssignedTester(None)
        );
        assert_eq!(
            LinkField::NetImpact.parse_edit("2").unwrap(),
            LinkEdit::NetImpact(s(2))
        );
    }

    #[test]
    fn value_map_carries_link_id_next_to_link_fields() {
        let change = ChangeSet {
            control: vec![ControlEdit::Name("X".into())],
            link: Some(LinkChange {
                link_id: LinkId::new("lnk-1"),
                edits: vec![LinkEdit::NetProbability(s(1))],
            }),
        };
        let map = change.to_value_map();
        assert_eq!(map["name"], "X");
        assert_eq!(map["link_netProbability"], 1);
        assert_eq!(map[LINK_ID_KEY], "lnk-1");
        assert_eq!(change.field_keys(), vec!["name", "link_netProbability"]);
    }

    #[test]
    fn empty_link_change_counts_as_empty() {
        let change = ChangeSet {
            control: vec![],
            link: Some(LinkChange {
                link_id: LinkId::new("lnk-1"),
                edits: vec![],
            }),
        };
        assert!(change.is_empty());
        assert!(!change.affects_score());
    }

    #[test]
    fn edits_serialize_with_field_tags() {
        let json = serde_json::to_value(ControlEdit::AssignedTester(Some("user-7".into()))).unwrap();
        assert_eq!(json["field"], "assignedTesterId");
        assert_eq!(json["value"], "user-7");

        let json = serde_json::to_value(LinkEdit::NetImpact(None)).unwrap();
        assert_eq!(json["field"], "link_netImpact");
    }

    #[test]
    fn assigned_tester_ignores_unassignment() {
        let assign = ChangeSet::control_only(vec![ControlEdit::AssignedTester(Some("user-1".into()))]);
        assert_eq!(assign.assigned_tester(), Some(&UserId::new("user-1")));

        let clear = ChangeSet::control_only(vec![ControlEdit::AssignedTester(None)]);
        assert_eq!(clear.assigned_tester(), None);
    }
}
