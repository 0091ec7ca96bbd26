// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Glue between the scheduler page, its form and the admin services

use crate::{
    behavior::{Clock, Zone},
    catalog::{
        self, BuildContext, FormKind, Intent, Mode, Recurrence, AGENT_CONTROL, EVENT_ID_CONTROL,
        RESOURCE_PREFIX, SERIES_ID_CONTROL, SERIES_NAME_CONTROL, WORKFLOW_CONTROL,
    },
    client::{
        CaptureAgents, ClientError, Conflict, ConflictCheck, ConflictQuery, EventStore,
        HttpClient, SeriesDirectory,
    },
    error::FormError,
    manager::{FormManager, ValidationReport},
    page::{Control, Page},
    registry::Registry,
    series::{SeriesError, SeriesResolver},
    settings::Settings,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("series could not be resolved: {0}")]
    Series(#[from] SeriesError),
}

/// Services the scheduler page talks to
#[derive(Clone)]
pub struct Collaborators {
    pub agents: Arc<dyn CaptureAgents>,
    pub series: Arc<dyn SeriesDirectory>,
    pub conflicts: Arc<dyn ConflictCheck>,
    pub events: Arc<dyn EventStore>,
}

impl Collaborators {
    pub fn http(client: Arc<HttpClient>) -> Self {
        Self {
            agents: client.clone(),
            series: client.clone(),
            conflicts: client.clone(),
            events: client,
        }
    }
}

/// Result of submitting the scheduler form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Invalid(ValidationReport),
    Conflicts(Vec<Conflict>),
    Submitted { id: String, created: bool },
}

pub struct SchedulerController {
    page: Page,
    mode: Mode,
    context: BuildContext,
    manager: FormManager,
    default_workflow: Option<String>,
    collaborators: Collaborators,
    series: SeriesResolver,
}

impl SchedulerController {
    pub fn new(
        page: Page,
        mode: Mode,
        settings: &Settings,
        clock: Clock,
        collaborators: Collaborators,
    ) -> Result<Self, FormError> {
        let context = BuildContext {
            zone: settings.forms.zone(),
            resources: catalog::resources_on(&page),
            max_resources: settings.forms.max_resources,
            clock,
        };
        let manager = FormManager::for_form(
            FormKind::Scheduler(mode),
            &page,
            &context,
            settings.forms.namespace.clone(),
        )?;
        let series = SeriesResolver::new(collaborators.series.clone(), settings.api.series_timeout);

        let mut controller = Self {
            page,
            mode,
            context,
            manager,
            default_workflow: settings.forms.default_workflow.clone(),
            collaborators,
            series,
        };
        controller.apply_default_workflow();

        Ok(controller)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn manager(&self) -> &FormManager {
        &self.manager
    }

    pub fn series(&self) -> &SeriesResolver {
        &self.series
    }

    /// Rebuilds the form for `mode`, fields of the previous mode are dropped
    pub fn switch_mode(&mut self, mode: Mode) -> Result<(), FormError> {
        log::debug!("switching scheduler form to {mode:?}");

        self.mode = mode;
        self.rebuild()
    }

    /// Shows the resources of `agent` and adopts its timezone
    pub async fn select_agent(&mut self, agent: &str) -> Result<(), ControllerError> {
        let capabilities = self.collaborators.agents.capabilities(agent).await?;

        if !self.page.set_value(AGENT_CONTROL, agent) {
            self.page.insert(Control::select(AGENT_CONTROL, agent));
        }

        let removed = self.page.remove_prefixed(RESOURCE_PREFIX);
        log::trace!(
            "replacing {removed} resources with {} of `{agent}`",
            capabilities.resources.len()
        );
        for resource in &capabilities.resources {
            self.page.insert(Control::checkbox(
                catalog::resource_control(resource),
                resource.clone(),
                false,
            ));
        }

        if let Some(offset) = capabilities.offset() {
            self.context.zone = Zone::Fixed(offset);
        }
        self.context.resources = capabilities.resources;

        Ok(self.rebuild()?)
    }

    /// Loads an existing event into the form in edit mode
    pub async fn load_event(&mut self, id: &str) -> Result<(), ControllerError> {
        let document = self.collaborators.events.fetch(id).await?;

        let recurring = FormKind::Scheduler(Mode::new(Recurrence::Recurring, Intent::Edit));
        let recurrence = if document.root == recurring.root_element() {
            Recurrence::Recurring
        } else {
            Recurrence::Single
        };

        if !self.page.set_value(EVENT_ID_CONTROL, id) {
            self.page.insert(Control::hidden(EVENT_ID_CONTROL, id));
        }
        self.switch_mode(Mode::new(recurrence, Intent::Edit))?;
        self.manager.populate(&mut self.page, &document)?;

        let series_id = self.page.value(SERIES_ID_CONTROL).trim().to_owned();
        if !series_id.is_empty() {
            match self.collaborators.series.series(&series_id).await {
                Ok(Some(series)) => {
                    self.page.set_value(SERIES_NAME_CONTROL, series.title);
                }
                Ok(None) => log::warn!("event {id} refers to unknown series {series_id}"),
                Err(err) => log::warn!("failed to look up series {series_id}: {err}"),
            }
        }

        Ok(())
    }

    /// The series name was edited, a previously resolved id no longer applies
    pub fn rename_series(&mut self, name: &str) {
        self.series.reset();
        self.page.set_value(SERIES_NAME_CONTROL, name);
        self.page.set_value(SERIES_ID_CONTROL, "");
    }

    /// Resolves the series, validates the form, checks for conflicts and stores the event
    pub async fn submit(&mut self) -> Result<Submission, ControllerError> {
        self.resolve_series().await?;

        let report = self.manager.report(&mut self.page)?;
        if !report.is_valid() {
            log::debug!("submission rejected, failing fields: {:?}", report.failed);
            return Ok(Submission::Invalid(report));
        }
        let document = self.manager.render(&self.page)?;

        let event_id = self.event_id();
        let query = self.conflict_query()?;
        let conflicts: Vec<Conflict> = self
            .collaborators
            .conflicts
            .conflicts(&query)
            .await?
            .into_iter()
            .filter(|conflict| Some(conflict.id.as_str()) != event_id.as_deref())
            .collect();

        if !conflicts.is_empty() {
            log::info!("submission blocked by {} conflicts", conflicts.len());
            return Ok(Submission::Conflicts(conflicts));
        }

        match event_id {
            Some(id) => {
                self.collaborators.events.update(&id, &document).await?;
                Ok(Submission::Submitted { id, created: false })
            }
            None => {
                let id = self.collaborators.events.create(&document).await?;
                Ok(Submission::Submitted { id, created: true })
            }
        }
    }

    fn rebuild(&mut self) -> Result<(), FormError> {
        let kind = FormKind::Scheduler(self.mode);
        let registry = Registry::build(&self.page, kind.specs(&self.context))?;

        self.manager.replace_registry(registry, kind.root_element());
        self.apply_default_workflow();

        Ok(())
    }

    fn apply_default_workflow(&mut self) {
        if let Some(workflow) = &self.default_workflow {
            if self.page.value(WORKFLOW_CONTROL).is_empty() {
                self.page.set_value(WORKFLOW_CONTROL, workflow.clone());
            }
        }
    }

    async fn resolve_series(&mut self) -> Result<(), SeriesError> {
        let name = self.page.value(SERIES_NAME_CONTROL).trim().to_owned();
        if name.is_empty() || !self.page.value(SERIES_ID_CONTROL).trim().is_empty() {
            return Ok(());
        }

        let id = self.series.ensure(&name).await?;
        self.page.set_value(SERIES_ID_CONTROL, id);

        Ok(())
    }

    fn event_id(&self) -> Option<String> {
        if !self.mode.is_edit() {
            return None;
        }

        let id = self.page.value(EVENT_ID_CONTROL).trim();
        (!id.is_empty()).then(|| id.to_owned())
    }

    fn conflict_query(&self) -> Result<ConflictQuery, FormError> {
        let registry = self.manager.registry();
        let millis = |name: &str| -> Result<i64, FormError> {
            registry
                .value_of(name, &self.page)?
                .as_millis()
                .ok_or_else(|| FormError::not_ready(name, "no time value"))
        };

        let device = registry.value_of("agent", &self.page)?.to_string();

        if self.mode.is_recurring() {
            Ok(ConflictQuery::Recurring {
                device,
                start: millis("recurrenceStart")?,
                end: millis("recurrenceEnd")?,
                duration: millis("recurrenceDuration")?,
                rule: registry.value_of("recurrence", &self.page)?.to_string(),
            })
        } else {
            let start = millis("startDate")?;
            let end = start
                .checked_add(millis("duration")?)
                .ok_or_else(|| FormError::not_ready("duration", "end out of range"))?;
            Ok(ConflictQuery::Window { device, start, end })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        client::{AgentCapabilities, Series},
        document::MetadataDocument,
        series::test::FakeDirectory,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FakeAgents;

    #[async_trait]
    impl CaptureAgents for FakeAgents {
        async fn agents(&self) -> Result<Vec<crate::client::CaptureAgent>, ClientError> {
            Ok(Vec::new())
        }

        async fn capabilities(&self, _agent: &str) -> Result<AgentCapabilities, ClientError> {
            Ok(AgentCapabilities {
                resources: vec!["screen".into(), "audio".into()],
                timezone_offset: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeConflicts(Vec<Conflict>);

    #[async_trait]
    impl ConflictCheck for FakeConflicts {
        async fn conflicts(&self, _query: &ConflictQuery) -> Result<Vec<Conflict>, ClientError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeEvents {
        events: Mutex<HashMap<String, MetadataDocument>>,
    }

    #[async_trait]
    impl EventStore for FakeEvents {
        async fn fetch(&self, id: &str) -> Result<MetadataDocument, ClientError> {
            self.events
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(id.to_owned()))
        }

        async fn create(&self, document: &MetadataDocument) -> Result<String, ClientError> {
            let mut events = self.events.lock();
            let id = format!("event-{}", events.len() + 1);
            events.insert(id.clone(), document.clone());
            Ok(id)
        }

        async fn update(&self, id: &str, document: &MetadataDocument) -> Result<(), ClientError> {
            self.events.lock().insert(id.to_owned(), document.clone());
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), ClientError> {
            self.events.lock().remove(id);
            Ok(())
        }
    }

    fn scheduler_page() -> Page {
        let mut page = Page::with_controls([
            Control::text("title", ""),
            Control::text("creator", ""),
            Control::text("contributor", ""),
            Control::hidden(SERIES_ID_CONTROL, ""),
            Control::text(SERIES_NAME_CONTROL, ""),
            Control::text("subject", ""),
            Control::text("language", ""),
            Control::text("description", ""),
            Control::text("startDate", ""),
            Control::select("startTimeHour", ""),
            Control::select("startTimeMin", ""),
            Control::select("durationHour", ""),
            Control::select("durationMin", ""),
            Control::text("recurStart", ""),
            Control::select("recurStartTimeHour", ""),
            Control::select("recurStartTimeMin", ""),
            Control::select("recurDurationHour", ""),
            Control::select("recurDurationMin", ""),
            Control::text("recurEnd", ""),
            Control::select(AGENT_CONTROL, ""),
            Control::select(WORKFLOW_CONTROL, ""),
            Control::checkbox("reviewHold", "true", false),
            Control::checkbox("captionHold", "true", false),
        ]);
        for (id, code) in [
            ("repeatSun", "SU"),
            ("repeatMon", "MO"),
            ("repeatTue", "TU"),
            ("repeatWed", "WE"),
            ("repeatThu", "TH"),
            ("repeatFri", "FR"),
            ("repeatSat", "SA"),
        ] {
            page.insert(Control::checkbox(id, code, false));
        }
        page
    }

    struct Fixture {
        directory: Arc<FakeDirectory>,
        events: Arc<FakeEvents>,
        controller: SchedulerController,
    }

    fn fixture(conflicts: Vec<Conflict>) -> Fixture {
        fixture_in(conflicts, Settings::default().forms.default_timezone)
    }

    fn fixture_in(conflicts: Vec<Conflict>, timezone: chrono_tz::Tz) -> Fixture {
        let directory = Arc::new(FakeDirectory::default());
        directory.series.lock().push(Series {
            id: "physics".into(),
            title: "Physics 101".into(),
        });
        let events = Arc::new(FakeEvents::default());

        let collaborators = Collaborators {
            agents: Arc::new(FakeAgents),
            series: directory.clone(),
            conflicts: Arc::new(FakeConflicts(conflicts)),
            events: events.clone(),
        };

        let mut settings = Settings::default();
        settings.forms.default_workflow = Some("fast".into());
        settings.forms.default_timezone = timezone;
        let clock = Clock::fixed(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let controller =
            SchedulerController::new(scheduler_page(), Mode::default(), &settings, clock, collaborators)
                .unwrap();

        Fixture {
            directory,
            events,
            controller,
        }
    }

    fn fill_single(page: &mut Page) {
        page.set_value("title", "Lecture 1");
        page.set_value(SERIES_NAME_CONTROL, "Chemistry");
        page.set_value("startDate", "2024-01-15");
        page.set_value("startTimeHour", "14");
        page.set_value("startTimeMin", "30");
        page.set_value("durationHour", "1");
        page.set_value("durationMin", "30");
        page.set_checked("resource-screen", true);
    }

    #[tokio::test]
    async fn submit_creates_event() {
        let mut fixture = fixture(Vec::new());
        let controller = &mut fixture.controller;

        controller.select_agent("room-1").await.unwrap();
        fill_single(controller.page_mut());

        let submission = controller.submit().await.unwrap();
        assert_eq!(
            submission,
            Submission::Submitted {
                id: "event-1".into(),
                created: true
            }
        );

        let document = fixture.events.fetch("event-1").await.unwrap();
        assert_eq!(document.root, "event");
        assert_eq!(document.get("title"), Some("Lecture 1"));
        assert_eq!(document.get("device"), Some("room-1"));
        assert_eq!(document.get("resources"), Some("screen"));
        assert_eq!(document.get("startDate"), Some("1705329000000"));
        assert_eq!(document.get("duration"), Some("5400000"));
        assert_eq!(document.get("endDate"), Some("1705334400000"));
        assert_eq!(document.get("seriesId"), Some("series-1"));
        assert_eq!(
            document.get(catalog::WORKFLOW_DEFINITION_KEY),
            Some("fast")
        );
        assert_eq!(*fixture.directory.creates.lock(), 1);
    }

    #[tokio::test]
    async fn summer_date_scheduled_in_winter() {
        let mut fixture = fixture_in(Vec::new(), chrono_tz::Tz::Europe__Berlin);
        let controller = &mut fixture.controller;

        controller.select_agent("room-1").await.unwrap();
        fill_single(controller.page_mut());
        controller.page_mut().set_value("startDate", "2024-07-15");
        controller.page_mut().set_value("startTimeHour", "14");
        controller.page_mut().set_value("startTimeMin", "0");

        controller.submit().await.unwrap();

        let document = fixture.events.fetch("event-1").await.unwrap();
        // 14:00 CEST
        assert_eq!(document.get("startDate"), Some("1721044800000"));
    }

    #[tokio::test]
    async fn invalid_form_is_not_submitted() {
        let mut fixture = fixture(Vec::new());
        let controller = &mut fixture.controller;

        controller.select_agent("room-1").await.unwrap();
        fill_single(controller.page_mut());
        controller.page_mut().set_value("title", "");

        match controller.submit().await.unwrap() {
            Submission::Invalid(report) => assert_eq!(report.failed, vec!["title".to_owned()]),
            other => panic!("unexpected submission {other:?}"),
        }
        assert!(controller.page().is_error_visible("missingTitle"));
        assert!(fixture.events.events.lock().is_empty());
    }

    #[tokio::test]
    async fn conflicts_block_submission() {
        let conflict = Conflict {
            id: "other".into(),
            title: "Exam".into(),
            start: None,
        };
        let mut fixture = fixture(vec![conflict.clone()]);
        let controller = &mut fixture.controller;

        controller.select_agent("room-1").await.unwrap();
        fill_single(controller.page_mut());

        assert_eq!(
            controller.submit().await.unwrap(),
            Submission::Conflicts(vec![conflict])
        );
        assert!(fixture.events.events.lock().is_empty());
    }

    #[tokio::test]
    async fn edit_recurring_event() {
        let mut fixture = fixture(Vec::new());

        // 2030-01-14 is a monday
        let mut stored = MetadataDocument::new("recurringEvent");
        stored.promote("recurrence", "FREQ=WEEKLY;BYDAY=MO,WE;BYHOUR=9;BYMINUTE=0");
        stored.push("title", "Seminar");
        stored.push("seriesId", "physics");
        stored.push("startDate", "1894611600000");
        stored.push("duration", "3600000");
        stored.push("endDate", "1897034400000");
        stored.push("device", "room-1");
        stored.push("resources", "audio");
        fixture
            .events
            .events
            .lock()
            .insert("event-9".into(), stored);

        let controller = &mut fixture.controller;
        controller.select_agent("room-1").await.unwrap();
        controller.load_event("event-9").await.unwrap();

        assert_eq!(
            controller.mode(),
            Mode::new(Recurrence::Recurring, Intent::Edit)
        );
        let page = controller.page();
        assert_eq!(page.value("recurStart"), "2030-01-14");
        assert_eq!(page.value("recurStartTimeHour"), "9");
        assert_eq!(page.value("recurDurationHour"), "1");
        assert_eq!(page.value("recurEnd"), "2030-02-11");
        assert!(page.is_checked("repeatMon"));
        assert!(page.is_checked("repeatWed"));
        assert!(!page.is_checked("repeatFri"));
        assert!(page.is_checked("resource-audio"));
        assert_eq!(page.value(SERIES_NAME_CONTROL), "Physics 101");

        let submission = controller.submit().await.unwrap();
        assert_eq!(
            submission,
            Submission::Submitted {
                id: "event-9".into(),
                created: false
            }
        );

        let updated = fixture.events.fetch("event-9").await.unwrap();
        assert_eq!(updated.root, "recurringEvent");
        assert_eq!(
            updated.promoted.get("eventId").map(String::as_str),
            Some("event-9")
        );
        assert_eq!(
            updated.get("recurrence"),
            Some("FREQ=WEEKLY;BYDAY=MO,WE;BYHOUR=9;BYMINUTE=0")
        );
        assert_eq!(updated.get("endDate"), Some("1897034400000"));
        assert_eq!(*fixture.directory.creates.lock(), 0);
    }

    #[tokio::test]
    async fn renaming_the_series_resolves_again() {
        let mut fixture = fixture(Vec::new());
        let controller = &mut fixture.controller;

        controller.select_agent("room-1").await.unwrap();
        fill_single(controller.page_mut());
        controller.page_mut().set_value(SERIES_NAME_CONTROL, "Physics 101");
        controller.submit().await.unwrap();
        assert_eq!(controller.page().value(SERIES_ID_CONTROL), "physics");

        controller.rename_series("Astronomy");
        controller.submit().await.unwrap();

        assert_eq!(controller.page().value(SERIES_ID_CONTROL), "series-1");
    }

    #[test]
    fn mode_switch_drops_fields_of_other_mode() {
        let mut fixture = fixture(Vec::new());
        let controller = &mut fixture.controller;

        controller
            .switch_mode(Mode::new(Recurrence::Recurring, Intent::Create))
            .unwrap();
        assert!(controller.manager().registry().contains("recurrence"));
        assert!(!controller.manager().registry().contains("startDate"));
        assert_eq!(controller.manager().root(), "recurringEvent");

        controller.switch_mode(Mode::default()).unwrap();
        assert!(!controller.manager().registry().contains("recurrence"));
        assert_eq!(controller.manager().root(), "event");
    }
}
