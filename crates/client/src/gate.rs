//! Reactive UI gate: a [`GateBinding`] kept in sync with the session.

use tokio::sync::watch;

use backoffice_auth::{GateBinding, Presentation, Session};

use crate::session::SessionContext;

/// One gated element.
///
/// The presentation is recomputed on every session transition and whenever
/// the binding is replaced.
#[derive(Debug)]
pub struct Gate {
    binding: GateBinding,
    session: watch::Receiver<Session>,
    presentation: Presentation,
}

impl Gate {
    pub fn mount(ctx: &SessionContext, binding: GateBinding) -> Self {
        let mut session = ctx.subscribe();
        let presentation = binding.evaluate(&session.borrow_and_update().evaluator());
        Self {
            binding,
            session,
            presentation,
        }
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn binding(&self) -> &GateBinding {
        &self.binding
    }

    /// Rebind the element (e.g. its required permission changed).
    pub fn update_binding(&mut self, binding: GateBinding) -> Presentation {
        self.binding = binding;
        self.recompute()
    }

    /// Wait for the next session transition and return the recomputed
    /// presentation; `None` once the session container is gone.
    pub async fn changed(&mut self) -> Option<Presentation> {
        self.session.changed().await.ok()?;
        Some(self.recompute())
    }

    fn recompute(&mut self) -> Presentation {
        let presentation = self.binding.evaluate(&self.session.borrow_and_update().evaluator());
        if presentation != self.presentation {
            tracing::trace!(?presentation, "gate presentation changed");
        }
        self.presentation = presentation;
        presentation
    }
}

#[cfg(test)]
mod tests {
    use backoffice_auth::Fallback;

    use super::*;
    use crate::backend::{Credentials, LoginOutcome};
    use crate::session::tests::{StubBackend, context, profile};
    use crate::storage::PersistedSession;

    fn signed_in(permissions: &[&'static str]) -> Option<PersistedSession> {
        Some(PersistedSession {
            token: "tok".to_string(),
            user: Some(profile(&["manager"], permissions)),
        })
    }

    #[tokio::test]
    async fn unmet_permission_with_disable_fallback_keeps_layout() {
        let (ctx, _, _) = context(StubBackend::default(), signed_in(&["can_view_job_offer"]));
        let gate = Gate::mount(
            &ctx,
            GateBinding::permission("can_create_job_offer").with_fallback(Fallback::Disable),
        );

        let presentation = gate.presentation();
        assert_eq!(presentation, Presentation::Disabled);
        assert!(presentation.occupies_layout());
        assert!(!presentation.is_interactive());
        assert!(presentation.is_dimmed());
        assert_eq!(presentation.aria_disabled(), Some("true"));
    }

    #[tokio::test]
    async fn unmet_permission_defaults_to_hidden() {
        let (ctx, _, _) = context(StubBackend::default(), signed_in(&[]));
        let gate = Gate::mount(&ctx, GateBinding::permission("can_create_job_offer"));

        assert_eq!(gate.presentation(), Presentation::Hidden);
        assert!(!gate.presentation().occupies_layout());
    }

    #[tokio::test]
    async fn gate_follows_login_and_logout() {
        let backend = StubBackend::default();
        backend.logins.lock().unwrap().push_back(Ok(LoginOutcome::Authenticated {
            token: "tok".to_string(),
            user: profile(&["admin"], &["can_refund_payment"]),
        }));
        let (ctx, _, _) = context(backend, None);
        let mut gate = Gate::mount(&ctx, GateBinding::permission("can_refund_payment"));
        assert_eq!(gate.presentation(), Presentation::Hidden);

        ctx.login(&Credentials::new("amina@example.com", "pw")).await.unwrap();
        assert_eq!(gate.changed().await, Some(Presentation::Visible));

        ctx.logout().await;
        assert_eq!(gate.changed().await, Some(Presentation::Hidden));
    }

    #[tokio::test]
    async fn rebinding_recomputes_immediately() {
        let (ctx, _, _) = context(StubBackend::default(), signed_in(&["can_view_payment"]));
        let mut gate = Gate::mount(&ctx, GateBinding::permission("can_refund_payment"));
        assert_eq!(gate.presentation(), Presentation::Hidden);

        assert_eq!(
            gate.update_binding(GateBinding::permission("can_view_payment")),
            Presentation::Visible
        );
        assert_eq!(gate.update_binding(GateBinding::default()), Presentation::Visible);
    }

    #[tokio::test]
    async fn changed_ends_when_context_is_dropped() {
        let (ctx, _, _) = context(StubBackend::default(), None);
        let mut gate = Gate::mount(&ctx, GateBinding::role("admin"));
        drop(ctx);

        assert_eq!(gate.changed().await, None);
    }
}
