// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Field declarations of the scheduler and upload forms

use crate::{
    behavior::{
        Clock, DateTimeBehavior, DurationBehavior, RecurrenceBehavior, RecurrenceEndBehavior,
        ResourcesBehavior, SeriesBehavior, Zone,
    },
    field::FieldSpec,
    page::Page,
};
use serde::{Deserialize, Serialize};

pub const WORKFLOW_DEFINITION_KEY: &str = "org.opencastproject.workflow.definition";
pub const REVIEW_HOLD_KEY: &str = "org.opencastproject.workflow.config.review.hold";
pub const CAPTION_HOLD_KEY: &str = "org.opencastproject.workflow.config.caption.hold";

/// Prefix of the capability checkboxes of the selected capture agent
pub const RESOURCE_PREFIX: &str = "resource-";

pub const SERIES_ID_CONTROL: &str = "seriesId";
pub const SERIES_NAME_CONTROL: &str = "series";
pub const AGENT_CONTROL: &str = "agent";
pub const WORKFLOW_CONTROL: &str = "workflowSelector";
pub const EVENT_ID_CONTROL: &str = "eventId";

const WEEKDAYS: [(&str, &str); 7] = [
    ("repeatSun", "SU"),
    ("repeatMon", "MO"),
    ("repeatTue", "TU"),
    ("repeatWed", "WE"),
    ("repeatThu", "TH"),
    ("repeatFri", "FR"),
    ("repeatSat", "SA"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Single,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Create,
    Edit,
}

/// Structural mode of the scheduler page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode {
    pub recurrence: Recurrence,
    pub intent: Intent,
}

impl Mode {
    pub const fn new(recurrence: Recurrence, intent: Intent) -> Self {
        Self { recurrence, intent }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence == Recurrence::Recurring
    }

    pub fn is_edit(&self) -> bool {
        self.intent == Intent::Edit
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::new(Recurrence::Single, Intent::Create)
    }
}

/// The forms of the admin pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Scheduler(Mode),
    Upload,
}

impl FormKind {
    pub fn root_element(&self) -> &'static str {
        match self {
            Self::Scheduler(mode) if mode.is_recurring() => "recurringEvent",
            Self::Scheduler(_) => "event",
            Self::Upload => "mediapackage-metadata",
        }
    }

    pub fn specs(&self, context: &BuildContext) -> Vec<FieldSpec> {
        match self {
            Self::Scheduler(mode) => scheduler(*mode, context),
            Self::Upload => upload(),
        }
    }
}

/// Page dependent inputs of the field declarations
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Timezone of the selected capture agent, the configured default until one reports it
    pub zone: Zone,
    pub clock: Clock,
    /// Capability names of the selected capture agent
    pub resources: Vec<String>,
    pub max_resources: usize,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            zone: Zone::utc(),
            clock: Clock::system(),
            resources: Vec::new(),
            max_resources: usize::MAX,
        }
    }
}

pub fn resource_control(name: &str) -> String {
    format!("{RESOURCE_PREFIX}{name}")
}

/// Capability names of the resource checkboxes present on the page
pub fn resources_on(page: &Page) -> Vec<String> {
    page.controls()
        .filter_map(|control| control.id.strip_prefix(RESOURCE_PREFIX))
        .map(str::to_owned)
        .collect()
}

fn descriptive() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("title")
            .control("title")
            .required(true)
            .label("titleLabel")
            .error_ref("missingTitle"),
        FieldSpec::new("creator").control("creator"),
        FieldSpec::new("contributor").control("contributor"),
        FieldSpec::new("seriesId")
            .controls([SERIES_ID_CONTROL, SERIES_NAME_CONTROL])
            .metadata_key("seriesId")
            .alias("isPartOf")
            .label("seriesLabel")
            .error_ref("missingSeries")
            .behavior(SeriesBehavior),
        FieldSpec::new("subject").control("subject"),
        FieldSpec::new("language").control("language"),
        FieldSpec::new("description").control("description"),
    ]
}

/// Fields of the scheduler form in `mode`
pub fn scheduler(mode: Mode, context: &BuildContext) -> Vec<FieldSpec> {
    let mut specs = Vec::new();

    if mode.is_edit() {
        specs.push(FieldSpec::new("eventId").control(EVENT_ID_CONTROL));
    }

    specs.extend(descriptive());

    let mut start = DateTimeBehavior::new(context.zone);
    if !mode.is_edit() {
        start = start.not_in_past(context.clock.clone());
    }

    if mode.is_recurring() {
        specs.extend([
            FieldSpec::new("recurrenceStart")
                .controls(["recurStart", "recurStartTimeHour", "recurStartTimeMin"])
                .metadata_key("startDate")
                .required(true)
                .label("recurStartLabel")
                .error_ref("missingRecurStart")
                .behavior(start),
            FieldSpec::new("recurrenceDuration")
                .controls(["recurDurationHour", "recurDurationMin"])
                .metadata_key("duration")
                .required(true)
                .label("recurDurationLabel")
                .error_ref("missingRecurDuration")
                .behavior(DurationBehavior::new()),
            FieldSpec::new("recurrenceEnd")
                .control("recurEnd")
                .metadata_key("endDate")
                .required(true)
                .label("recurEndLabel")
                .error_ref("errorRecurrenceEnd")
                .behavior(RecurrenceEndBehavior::new(
                    "recurrenceStart",
                    "recurrenceDuration",
                    context.zone,
                )),
            FieldSpec::new("recurrence")
                .controls(WEEKDAYS.iter().map(|(id, _)| *id))
                .metadata_key("recurrence")
                .alias("recurrencePattern")
                .required(true)
                .label("recurDaysLabel")
                .error_ref("missingRecurDays")
                .behavior(RecurrenceBehavior::new("recurrenceStart", context.zone)),
        ]);
    } else {
        specs.extend([
            FieldSpec::new("startDate")
                .controls(["startDate", "startTimeHour", "startTimeMin"])
                .metadata_key("startDate")
                .required(true)
                .label("startLabel")
                .error_ref("errorStartDate")
                .behavior(start),
            FieldSpec::new("duration")
                .controls(["durationHour", "durationMin"])
                .metadata_key("duration")
                .required(true)
                .label("durationLabel")
                .error_ref("missingDuration")
                .behavior(DurationBehavior::ending_after("startDate")),
        ]);
    }

    specs.extend([
        FieldSpec::new("agent")
            .control(AGENT_CONTROL)
            .metadata_key("device")
            .alias("spatial")
            .required(true)
            .label("agentLabel")
            .error_ref("missingAgent"),
        FieldSpec::new("resources")
            .controls(context.resources.iter().map(|name| resource_control(name)))
            .metadata_key("resources")
            .required(true)
            .label("inputLabel")
            .error_ref("missingInputs")
            .behavior(ResourcesBehavior::new(context.max_resources)),
        FieldSpec::new("workflowDefinition")
            .control(WORKFLOW_CONTROL)
            .metadata_key(WORKFLOW_DEFINITION_KEY),
        FieldSpec::new("reviewHold")
            .control("reviewHold")
            .metadata_key(REVIEW_HOLD_KEY),
        FieldSpec::new("captionHold")
            .control("captionHold")
            .metadata_key(CAPTION_HOLD_KEY),
    ]);

    specs
}

/// Fields of the media upload form
pub fn upload() -> Vec<FieldSpec> {
    let mut specs = descriptive();

    specs.extend([
        FieldSpec::new("license").control("license"),
        FieldSpec::new("workflowDefinition")
            .control(WORKFLOW_CONTROL)
            .metadata_key(WORKFLOW_DEFINITION_KEY),
    ]);

    specs
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(specs: &[FieldSpec]) -> Vec<&str> {
        specs.iter().map(FieldSpec::name).collect()
    }

    #[test]
    fn mode_only_fields() {
        let context = BuildContext::default();

        let single = scheduler(Mode::default(), &context);
        assert!(names(&single).contains(&"startDate"));
        assert!(!names(&single).contains(&"recurrence"));
        assert!(!names(&single).contains(&"eventId"));

        let recurring = scheduler(
            Mode::new(Recurrence::Recurring, Intent::Create),
            &context,
        );
        assert!(names(&recurring).contains(&"recurrence"));
        assert!(names(&recurring).contains(&"recurrenceEnd"));
        assert!(!names(&recurring).contains(&"startDate"));

        let edit = scheduler(Mode::new(Recurrence::Single, Intent::Edit), &context);
        assert_eq!(names(&edit)[0], "eventId");
    }

    #[test]
    fn dependencies_come_from_the_behaviors() {
        let page = Page::new();
        let depends_on = |mode: Mode, name: &str| {
            scheduler(mode, &BuildContext::default())
                .into_iter()
                .find(|spec| spec.name() == name)
                .map(|spec| spec.bind(&page).depends_on().to_vec())
                .unwrap()
        };
        let recurring = Mode::new(Recurrence::Recurring, Intent::Create);

        assert_eq!(depends_on(Mode::default(), "duration"), vec!["startDate"]);
        assert_eq!(
            depends_on(recurring, "recurrenceEnd"),
            vec!["recurrenceStart", "recurrenceDuration"]
        );
        assert_eq!(depends_on(recurring, "recurrence"), vec!["recurrenceStart"]);
    }

    #[test]
    fn root_elements() {
        assert_eq!(FormKind::Scheduler(Mode::default()).root_element(), "event");
        assert_eq!(
            FormKind::Scheduler(Mode::new(Recurrence::Recurring, Intent::Edit)).root_element(),
            "recurringEvent"
        );
        assert_eq!(FormKind::Upload.root_element(), "mediapackage-metadata");
    }

    #[test]
    fn upload_fields() {
        assert_eq!(
            names(&upload()),
            vec![
                "title",
                "creator",
                "contributor",
                "seriesId",
                "subject",
                "language",
                "description",
                "license",
                "workflowDefinition"
            ]
        );
    }

    #[test]
    fn resource_controls_follow_the_agent() {
        let context = BuildContext {
            resources: vec!["screen".into(), "camera".into()],
            ..Default::default()
        };

        assert_eq!(resource_control("screen"), "resource-screen");
        let page = Page::with_controls([
            crate::page::Control::checkbox("resource-screen", "screen", false),
            crate::page::Control::text("title", ""),
        ]);
        assert_eq!(resources_on(&page), vec!["screen".to_owned()]);
        assert_eq!(scheduler(Mode::default(), &context).len(), 14);
    }
}
