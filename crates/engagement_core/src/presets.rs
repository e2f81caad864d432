use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::PresetId,
    protocol::{MessageResponse, Preset, PresetFormResponse, PresetSubmitResponse},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::Endpoints,
    error::{EngagementError, FailureCopy},
    ports::{ConfirmPrompt, Navigator, Notice, Notifier, PresetView},
    session::Session,
    transport::{classify, decode, AuthSignal, HttpRequest, Transport, CSRF_FORM_FIELD},
};

const DELETE_PROMPT: &str = "Delete this preset? This action cannot be undone.";
const SAVED_NOTICE: &str = "Preset saved.";
const DELETED_NOTICE: &str = "Search preset deleted.";

const FORM_COPY: FailureCopy = FailureCopy {
    server: "Failed to load the preset form.",
    transport: "Unable to load the preset form.",
    auth: "Please sign in to manage search presets.",
};

const SUBMIT_COPY: FailureCopy = FailureCopy {
    server: "Failed to save the preset.",
    transport: "Unable to save the preset right now.",
    auth: "Please sign in to save search presets.",
};

const DELETE_COPY: FailureCopy = FailureCopy {
    server: "Failed to delete the preset.",
    transport: "Unable to delete the preset right now.",
    auth: "Please sign in to manage search presets.",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormPhase {
    #[default]
    Idle,
    Loading {
        editing: Option<PresetId>,
    },
    Open {
        editing: Option<PresetId>,
    },
    Submitting {
        editing: Option<PresetId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePhase {
    #[default]
    Idle,
    Confirming(PresetId),
    Deleting(PresetId),
}

/// One row of the on-screen preset list.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetEntry {
    pub preset: Preset,
    /// Server-rendered card fragment, when one has been delivered.
    pub card: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetOption {
    pub id: PresetId,
    pub label: String,
}

/// Form-encoded fields exactly as the user submitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetFormData {
    pub fields: Vec<(String, String)>,
}

impl PresetFormData {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn preset_id(&self) -> Option<PresetId> {
        self.get("id").and_then(PresetId::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Opened,
    Ignored,
    Failed(EngagementError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved(PresetId),
    /// Another submission is outstanding, or no form is open.
    Ignored,
    Failed(EngagementError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    Ignored,
    Failed(EngagementError),
}

#[derive(Default)]
struct PresetState {
    form: FormPhase,
    delete: DeletePhase,
    entries: Vec<PresetEntry>,
    options: Vec<PresetOption>,
}

impl PresetState {
    /// Replace-by-id or prepend; running it twice with the same payload is a
    /// no-op the second time.
    fn reconcile(&mut self, preset: Preset, card: Option<String>) {
        let id = preset.id;
        match self.entries.iter_mut().find(|entry| entry.preset.id == id) {
            Some(entry) => {
                entry.preset = preset.clone();
                if card.is_some() {
                    entry.card = card;
                }
            }
            None => self.entries.insert(0, PresetEntry { preset: preset.clone(), card }),
        }

        match self.options.iter_mut().find(|option| option.id == id) {
            Some(option) => option.label = preset.label,
            None => self.options.push(PresetOption {
                id,
                label: preset.label,
            }),
        }
    }

    fn remove(&mut self, id: PresetId) {
        self.entries.retain(|entry| entry.preset.id != id);
        self.options.retain(|option| option.id != id);
    }
}

pub struct PresetManager {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    session: Arc<Session>,
    view: Arc<dyn PresetView>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    confirm: Arc<dyn ConfirmPrompt>,
    inner: Mutex<PresetState>,
}

impl PresetManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<Endpoints>,
        session: Arc<Session>,
        view: Arc<dyn PresetView>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        confirm: Arc<dyn ConfirmPrompt>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            session,
            view,
            notifier,
            navigator,
            confirm,
            inner: Mutex::new(PresetState::default()),
        }
    }

    /// Seeds list and selector from the server-rendered page.
    pub async fn hydrate(&self, presets: Vec<(Preset, Option<String>)>) {
        let mut guard = self.inner.lock().await;
        guard.entries.clear();
        guard.options.clear();
        let mut seen = HashSet::new();
        for (preset, card) in presets {
            if !seen.insert(preset.id) {
                debug!("presets: duplicate preset on page id={}", preset.id);
                continue;
            }
            guard.options.push(PresetOption {
                id: preset.id,
                label: preset.label.clone(),
            });
            guard.entries.push(PresetEntry { preset, card });
        }
        self.render_collections(&guard).await;
    }

    pub async fn reset(&self) {
        *self.inner.lock().await = PresetState::default();
    }

    pub async fn entries(&self) -> Vec<PresetEntry> {
        self.inner.lock().await.entries.clone()
    }

    pub async fn options(&self) -> Vec<PresetOption> {
        self.inner.lock().await.options.clone()
    }

    pub async fn form_phase(&self) -> FormPhase {
        self.inner.lock().await.form
    }

    pub async fn delete_phase(&self) -> DeletePhase {
        self.inner.lock().await.delete
    }

    /// User picked an option in the selector.
    pub async fn select(&self, preset: Option<PresetId>) {
        self.session.select_preset(preset).await;
        let guard = self.inner.lock().await;
        self.view.render_selector(&guard.options, preset);
    }

    async fn render_collections(&self, state: &PresetState) {
        let selected = self.session.selected_preset().await;
        self.view.render_list(&state.entries);
        self.view.render_selector(&state.options, selected);
    }

    async fn redirect_to_login(&self) {
        let login = self.session.login_url().await;
        warn!("presets: auth required redirect={login}");
        self.notifier.notify(Notice::error(FORM_COPY.auth));
        self.navigator.redirect_to_login(&login);
    }

    pub async fn load_form(&self, editing: Option<PresetId>) -> FormOutcome {
        {
            let mut guard = self.inner.lock().await;
            if matches!(
                guard.form,
                FormPhase::Loading { .. } | FormPhase::Submitting { .. }
            ) {
                debug!("presets: form load ignored phase={:?}", guard.form);
                return FormOutcome::Ignored;
            }
            guard.form = FormPhase::Loading { editing };
        }
        self.view.set_form_loading(true);

        let result = self.fetch_form(editing).await;
        self.view.set_form_loading(false);

        let mut guard = self.inner.lock().await;
        if guard.form != (FormPhase::Loading { editing }) {
            // Dismissed while loading; the form must not reappear.
            debug!("presets: form load discarded editing={editing:?} phase={:?}", guard.form);
            drop(guard);
            if matches!(&result, Err(err) if err.is_auth_required()) {
                self.redirect_to_login().await;
            }
            return FormOutcome::Ignored;
        }
        match result {
            Ok(markup) => {
                guard.form = FormPhase::Open { editing };
                self.view.render_form(&markup);
                FormOutcome::Opened
            }
            Err(err) => {
                guard.form = FormPhase::Idle;
                drop(guard);
                self.view.close_form();
                if err.is_auth_required() {
                    self.redirect_to_login().await;
                } else {
                    warn!("presets: form load failed editing={editing:?} error={err}");
                    self.notifier
                        .notify(Notice::error(err.user_message(&FORM_COPY)));
                }
                FormOutcome::Failed(err)
            }
        }
    }

    async fn fetch_form(&self, editing: Option<PresetId>) -> Result<String, EngagementError> {
        let url = self.endpoints.preset_form_for(editing);
        let reply = self.transport.send(HttpRequest::get(url)).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::StatusOrLoginRedirect, &login)?;
        Ok(decode::<PresetFormResponse>(&reply)?.form)
    }

    /// Dismissal via overlay or cancel button. A running submission keeps the
    /// form until it resolves.
    pub async fn close_form(&self) {
        let mut guard = self.inner.lock().await;
        if matches!(guard.form, FormPhase::Submitting { .. }) {
            return;
        }
        guard.form = FormPhase::Idle;
        self.view.close_form();
    }

    pub async fn submit(&self, form: PresetFormData) -> SubmitOutcome {
        let editing = {
            let mut guard = self.inner.lock().await;
            let FormPhase::Open { editing } = guard.form else {
                debug!("presets: submit ignored phase={:?}", guard.form);
                return SubmitOutcome::Ignored;
            };
            guard.form = FormPhase::Submitting { editing };
            editing
        };
        self.view.set_submit_enabled(false);

        let target = form.preset_id().or(editing);
        info!("presets: submit target={target:?}");
        let result = self.send_submit(&form, target).await;

        let outcome = self.apply_submit_result(editing, result).await;
        self.view.set_submit_enabled(true);
        outcome
    }

    async fn send_submit(
        &self,
        form: &PresetFormData,
        target: Option<PresetId>,
    ) -> Result<PresetSubmitResponse, EngagementError> {
        let csrf = match form.get(CSRF_FORM_FIELD) {
            Some(token) => token.to_string(),
            None => self.session.csrf_token().await,
        };
        let request = HttpRequest::post(
            self.endpoints.preset_submit_for(target),
            form.fields.clone(),
            Some(csrf),
        );
        let reply = self.transport.send(request).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::StatusOrLoginRedirect, &login)?;
        decode(&reply)
    }

    async fn apply_submit_result(
        &self,
        editing: Option<PresetId>,
        result: Result<PresetSubmitResponse, EngagementError>,
    ) -> SubmitOutcome {
        let mut guard = self.inner.lock().await;
        match result {
            Ok(PresetSubmitResponse {
                message,
                preference: Some(preset),
                card,
            }) => {
                let id = preset.id;
                guard.reconcile(preset, card);
                guard.form = FormPhase::Idle;
                self.session.select_preset(Some(id)).await;
                self.render_collections(&guard).await;
                self.view.close_form();
                self.notifier.notify(Notice::success(
                    message.unwrap_or_else(|| SAVED_NOTICE.to_string()),
                ));
                info!("presets: saved id={id}");
                SubmitOutcome::Saved(id)
            }
            Ok(_) => {
                // A 2xx without the preset cannot be reconciled by id.
                guard.form = FormPhase::Open { editing };
                let err = EngagementError::Server {
                    status: None,
                    message: None,
                };
                self.notifier
                    .notify(Notice::error(err.user_message(&SUBMIT_COPY)));
                SubmitOutcome::Failed(err)
            }
            Err(EngagementError::AuthRequired) => {
                guard.form = FormPhase::Idle;
                drop(guard);
                self.view.close_form();
                self.redirect_to_login().await;
                SubmitOutcome::Failed(EngagementError::AuthRequired)
            }
            Err(err) => {
                guard.form = FormPhase::Open { editing };
                if let EngagementError::Validation {
                    form: Some(markup), ..
                } = &err
                {
                    self.view.render_form(markup);
                }
                warn!("presets: submit failed editing={editing:?} error={err}");
                self.notifier
                    .notify(Notice::error(err.user_message(&SUBMIT_COPY)));
                SubmitOutcome::Failed(err)
            }
        }
    }

    pub async fn delete(&self, id: PresetId) -> DeleteOutcome {
        {
            let mut guard = self.inner.lock().await;
            if guard.delete != DeletePhase::Idle {
                debug!("presets: delete ignored phase={:?}", guard.delete);
                return DeleteOutcome::Ignored;
            }
            guard.delete = DeletePhase::Confirming(id);
        }

        if !self.confirm.confirm(DELETE_PROMPT).await {
            self.inner.lock().await.delete = DeletePhase::Idle;
            debug!("presets: delete declined id={id}");
            return DeleteOutcome::Declined;
        }

        self.inner.lock().await.delete = DeletePhase::Deleting(id);
        self.view.set_delete_pending(id, true);

        let result = self.send_delete(id).await;
        self.view.set_delete_pending(id, false);

        let mut guard = self.inner.lock().await;
        guard.delete = DeletePhase::Idle;
        match result {
            Ok(response) => {
                guard.remove(id);
                self.session.clear_selection_if(id).await;
                self.render_collections(&guard).await;
                self.notifier.notify(Notice::success(
                    response
                        .message
                        .unwrap_or_else(|| DELETED_NOTICE.to_string()),
                ));
                info!("presets: deleted id={id}");
                DeleteOutcome::Deleted
            }
            Err(EngagementError::AuthRequired) => {
                drop(guard);
                self.redirect_to_login().await;
                DeleteOutcome::Failed(EngagementError::AuthRequired)
            }
            Err(err) => {
                warn!("presets: delete failed id={id} error={err}");
                self.notifier
                    .notify(Notice::error(err.user_message(&DELETE_COPY)));
                DeleteOutcome::Failed(err)
            }
        }
    }

    async fn send_delete(&self, id: PresetId) -> Result<MessageResponse, EngagementError> {
        let csrf = self.session.csrf_token().await;
        let request = HttpRequest::post(
            self.endpoints.preset_delete.clone(),
            vec![
                ("id".to_string(), id.to_string()),
                (CSRF_FORM_FIELD.to_string(), csrf.clone()),
            ],
            Some(csrf),
        );
        let reply = self.transport.send(request).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::StatusOrLoginRedirect, &login)?;
        decode(&reply)
    }
}

#[cfg(test)]
#[path = "tests/presets_tests.rs"]
mod tests;
