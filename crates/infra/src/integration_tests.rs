//! Integration tests for the full command pipeline.
//!
//! Tests: bootstrap → CommandBus → middleware chain → command → history → audit
//!
//! Verifies:
//! - Validation vetoes happen before any command logic or recording
//! - Audit records are sanitized on both success and failure
//! - History capacity and redo invalidation hold through real commands
//! - Durable audit records land in the JSONL file

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use keel_accounts::{
        AccountError, ChangePassword, ChangePasswordInput, DeactivateUser, DeactivateUserInput,
        FingerprintHasher, InMemoryUserRepository, PasswordHasher, RegisterUser, RegisterUserInput,
        UpdateProfile, UpdateProfileInput, UserRepository, UserStatus, UserView,
    };
    use keel_bus::{BusError, Command};
    use keel_core::{DomainError, MetadataOverrides, UserId};
    use keel_middleware::{AuditOutcome, REDACTED};

    use crate::audit_store::JsonlAuditStore;
    use crate::bootstrap::{CommandCore, SharedCommandCore};
    use crate::config::CoreConfig;

    fn setup(config: CoreConfig) -> (SharedCommandCore, Arc<InMemoryUserRepository>) {
        keel_observability::init_test();
        let users = Arc::new(InMemoryUserRepository::new());
        let mut core = CommandCore::from_config(&config).unwrap();
        core.register_accounts(users.clone(), Arc::new(FingerprintHasher))
            .unwrap();
        (core.into_shared(), users)
    }

    fn register_input(email: &str) -> RegisterUserInput {
        RegisterUserInput {
            email: email.into(),
            display_name: "Alice".into(),
            password: "correct horse".into(),
        }
    }

    fn register(core: &SharedCommandCore, email: &str) -> UserView {
        core.bus
            .execute::<RegisterUser>(register_input(email), MetadataOverrides::new())
            .unwrap()
    }

    fn status(users: &InMemoryUserRepository, id: UserId) -> Option<UserStatus> {
        users.get(id).map(|u| u.status)
    }

    #[test]
    fn successful_command_flows_through_every_stage() {
        let (core, users) = setup(CoreConfig::default());
        let actor = UserId::new();

        let view = core
            .bus
            .execute::<RegisterUser>(
                register_input("alice@example.com"),
                MetadataOverrides::for_user(actor).with_trace("requestId", "req-1"),
            )
            .unwrap();

        // Command logic
        assert!(users.get(view.id).is_some());

        // History
        let history = core.history.as_ref().unwrap();
        let recorded = history.by_user(actor);
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].is_undoable());
        assert_eq!(recorded[0].metadata().trace()["requestId"], "req-1");

        // Audit (sanitized input, unsanitized-safe output)
        let audit = core.audit.as_ref().unwrap().entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].command_name, RegisterUser::NAME);
        assert_eq!(audit[0].command_id, recorded[0].command_id());
        assert_eq!(audit[0].user_id, Some(actor));
        assert_eq!(audit[0].input["password"], REDACTED);
        assert_eq!(audit[0].input["email"], "alice@example.com");
        let AuditOutcome::Success { output } = &audit[0].outcome else {
            panic!("expected a success record");
        };
        assert_eq!(output["id"], json!(view.id));
    }

    #[test]
    fn empty_email_is_blocked_by_validation() {
        let (core, users) = setup(CoreConfig::default());

        let err = core
            .bus
            .dispatch(
                RegisterUser::NAME,
                json!({ "email": "", "displayName": "Alice", "password": "correct horse" }),
                MetadataOverrides::new(),
            )
            .unwrap_err();

        let BusError::ExecutionBlocked {
            command,
            middleware,
            reason,
        } = err
        else {
            panic!("expected ExecutionBlocked");
        };
        assert_eq!(command, "RegisterUser");
        assert_eq!(middleware, "validation");
        assert!(reason.contains("email"));

        assert!(users.is_empty());
        assert_eq!(core.history.as_ref().unwrap().stats().total, 0);
        assert!(core.audit.as_ref().unwrap().is_empty());
    }

    #[test]
    fn without_validation_the_command_rejects_it_itself() {
        let (core, _) = setup(CoreConfig {
            enable_validation: false,
            ..CoreConfig::default()
        });

        let err = core
            .bus
            .execute::<RegisterUser>(register_input(""), MetadataOverrides::new())
            .unwrap_err();

        assert!(matches!(
            err.command_error::<AccountError>(),
            Some(AccountError::Domain(DomainError::Validation(_)))
        ));
        // The failure is audited.
        let audit = core.audit.as_ref().unwrap().entries();
        assert_eq!(audit.len(), 1);
        assert!(!audit[0].is_success());
    }

    #[test]
    fn failed_command_is_audited_with_redacted_credentials() {
        let (core, _) = setup(CoreConfig::default());
        let alice = register(&core, "alice@example.com");

        let err = core
            .bus
            .execute::<ChangePassword>(
                ChangePasswordInput {
                    user_id: alice.id,
                    current_password: "wrong guess".into(),
                    new_password: "battery staple".into(),
                },
                MetadataOverrides::for_user(alice.id),
            )
            .unwrap_err();
        assert!(matches!(err, BusError::CommandExecution { .. }));

        let audit = core.audit.as_ref().unwrap().entries();
        let failure = audit.last().unwrap();
        assert_eq!(failure.command_name, ChangePassword::NAME);
        assert_eq!(failure.input["currentPassword"], REDACTED);
        assert_eq!(failure.input["newPassword"], REDACTED);
        assert_eq!(failure.input["userId"], json!(alice.id));
        assert_eq!(
            failure.outcome,
            AuditOutcome::Failure {
                error: "unauthorized".into()
            }
        );

        // Only the registration was recorded.
        assert_eq!(core.history.as_ref().unwrap().stats().total, 1);
    }

    #[test]
    fn capacity_two_scenario_with_real_commands() {
        let (core, users) = setup(CoreConfig {
            max_history_size: 2,
            ..CoreConfig::default()
        });
        let history = core.history.clone().unwrap();

        let c1 = register(&core, "one@example.com");
        let c2 = register(&core, "two@example.com");
        let c3 = register(&core, "three@example.com");

        let ids = |entries: Vec<keel_core::ExecutedCommand>| -> Vec<keel_core::CommandId> {
            entries.iter().map(|e| e.command_id()).collect()
        };
        let undo_ids = ids(history.undo_entries());
        assert_eq!(undo_ids.len(), 2);

        // C1 was evicted: its registration can no longer be undone.
        let undone = core.bus.undo(MetadataOverrides::new()).unwrap();
        assert_eq!(undone.command_id(), undo_ids[1]);
        assert_eq!(status(&users, c3.id), Some(UserStatus::Withdrawn));
        assert_eq!(ids(history.undo_entries()), [undo_ids[0]]);
        assert_eq!(ids(history.redo_entries()), [undo_ids[1]]);

        // A new command clears redo.
        core.bus
            .execute::<UpdateProfile>(
                UpdateProfileInput {
                    user_id: c2.id,
                    email: None,
                    display_name: Some("Second".into()),
                },
                MetadataOverrides::new(),
            )
            .unwrap();
        assert_eq!(history.undo_entries().len(), 2);
        assert!(!history.can_redo());

        core.bus.undo(MetadataOverrides::new()).unwrap();
        core.bus.undo(MetadataOverrides::new()).unwrap();
        assert_eq!(status(&users, c2.id), Some(UserStatus::Withdrawn));
        assert_eq!(status(&users, c1.id), Some(UserStatus::Active));
        assert!(matches!(
            core.bus.undo(MetadataOverrides::new()),
            Err(BusError::NothingToUndo)
        ));
    }

    #[test]
    fn non_undoable_entries_are_skipped_by_undo() {
        let (core, users) = setup(CoreConfig::default());
        let alice = register(&core, "alice@example.com");

        core.bus
            .execute::<UpdateProfile>(
                UpdateProfileInput {
                    user_id: alice.id,
                    email: Some("alice@wonderland.example".into()),
                    display_name: None,
                },
                MetadataOverrides::new(),
            )
            .unwrap();
        core.bus
            .execute::<ChangePassword>(
                ChangePasswordInput {
                    user_id: alice.id,
                    current_password: "correct horse".into(),
                    new_password: "battery staple".into(),
                },
                MetadataOverrides::new(),
            )
            .unwrap();
        let history = core.history.as_ref().unwrap();
        assert_eq!(history.stats().total, 3);
        assert_eq!(history.stats().undoable, 2);

        let undone = core.bus.undo(MetadataOverrides::new()).unwrap();

        assert_eq!(undone.command_name(), UpdateProfile::NAME);
        assert_eq!(
            users.get(alice.id).unwrap().profile.email,
            "alice@example.com"
        );
        // The password change itself stays in effect.
        assert_ne!(
            users.get(alice.id).unwrap().password_hash,
            FingerprintHasher.hash("correct horse")
        );
    }

    #[test]
    fn password_change_survives_undo_and_redo_of_registration() {
        let (core, users) = setup(CoreConfig::default());
        let alice = register(&core, "alice@example.com");
        core.bus
            .execute::<ChangePassword>(
                ChangePasswordInput {
                    user_id: alice.id,
                    current_password: "correct horse".into(),
                    new_password: "battery staple".into(),
                },
                MetadataOverrides::new(),
            )
            .unwrap();

        core.bus.undo(MetadataOverrides::new()).unwrap();
        assert_eq!(status(&users, alice.id), Some(UserStatus::Withdrawn));
        core.bus.redo(MetadataOverrides::new()).unwrap();

        let restored = users.get(alice.id).unwrap();
        assert!(restored.is_active());
        assert_eq!(restored.password_hash, FingerprintHasher.hash("battery staple"));

        // The old password is really gone.
        let err = core
            .bus
            .execute::<ChangePassword>(
                ChangePasswordInput {
                    user_id: alice.id,
                    current_password: "correct horse".into(),
                    new_password: "something else".into(),
                },
                MetadataOverrides::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err.command_error::<AccountError>(),
            Some(AccountError::Domain(DomainError::Unauthorized))
        ));

        // History entries never carry the credential hash.
        let hash = restored.password_hash;
        for entry in core.history.as_ref().unwrap().undo_entries() {
            let encoded = serde_json::to_string(&entry).unwrap();
            assert!(!encoded.contains(&hash));
        }
    }

    #[test]
    fn deactivated_users_cannot_be_changed() {
        let (core, _) = setup(CoreConfig::default());
        let alice = register(&core, "alice@example.com");
        core.bus
            .execute::<DeactivateUser>(
                DeactivateUserInput {
                    user_id: alice.id,
                    reason: Some("offboarding".into()),
                },
                MetadataOverrides::new(),
            )
            .unwrap();

        let err = core
            .bus
            .execute::<UpdateProfile>(
                UpdateProfileInput {
                    user_id: alice.id,
                    email: None,
                    display_name: Some("Ghost".into()),
                },
                MetadataOverrides::new(),
            )
            .unwrap_err();

        assert!(matches!(
            err.command_error::<AccountError>(),
            Some(AccountError::Domain(DomainError::Conflict(_)))
        ));
    }

    #[test]
    fn history_date_range_is_inclusive() {
        let (core, _) = setup(CoreConfig::default());
        let before = Utc::now() - Duration::seconds(1);
        register(&core, "alice@example.com");
        let history = core.history.as_ref().unwrap();
        let completed = history.undo_entries()[0].timestamp();

        assert_eq!(history.by_date_range(before, completed).len(), 1);
        assert_eq!(history.by_date_range(completed, completed).len(), 1);
        assert!(
            history
                .by_date_range(completed + Duration::milliseconds(1), Utc::now())
                .is_empty()
        );
    }

    #[test]
    fn durable_audit_is_written_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit/commands.jsonl");
        let (core, _) = setup(CoreConfig {
            audit_log_path: Some(path.clone()),
            ..CoreConfig::default()
        });

        register(&core, "alice@example.com");
        let _ = core.bus.execute::<RegisterUser>(
            register_input("alice@example.com"),
            MetadataOverrides::new(),
        );

        let records = JsonlAuditStore::read_all(&path).unwrap();
        assert_eq!(records, core.audit.as_ref().unwrap().entries());
        assert_eq!(records.len(), 2);
        assert!(records[0].is_success());
        assert!(!records[1].is_success());
        assert!(!std::fs::read_to_string(&path).unwrap().contains("correct horse"));
    }

    #[test]
    fn shared_core_dispatches_concurrently() {
        let (core, users) = setup(CoreConfig {
            max_history_size: 1_000,
            ..CoreConfig::default()
        });

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let core = core.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        register(&core, &format!("user{t}-{i}@example.com"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(users.len(), 40);
        assert_eq!(core.history.as_ref().unwrap().stats().undo_size, 40);
        assert_eq!(core.audit.as_ref().unwrap().len(), 40);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Register,
        Undo,
        Redo,
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        prop_oneof![Just(Op::Register), Just(Op::Undo), Just(Op::Redo)]
    }

    proptest::proptest! {
        #[test]
        fn undo_redo_keeps_repository_and_history_consistent(
            capacity in 1usize..5,
            ops in proptest::collection::vec(op(), 0..30),
        ) {
            let (core, users) = setup(CoreConfig {
                max_history_size: capacity,
                ..CoreConfig::default()
            });
            let history = core.history.clone().unwrap();
            let mut registered = Vec::new();
            let mut applied = 0usize;

            for (i, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Register => {
                        registered.push(register(&core, &format!("user{i}@example.com")).id);
                        applied += 1;
                        proptest::prop_assert!(!history.can_redo());
                    }
                    Op::Undo => {
                        if core.bus.undo(MetadataOverrides::new()).is_ok() {
                            applied -= 1;
                        }
                    }
                    Op::Redo => {
                        if core.bus.redo(MetadataOverrides::new()).is_ok() {
                            applied += 1;
                        }
                    }
                }
                proptest::prop_assert!(history.stats().undo_size <= capacity);
                let active = registered
                    .iter()
                    .filter(|id| status(&users, **id) == Some(UserStatus::Active))
                    .count();
                proptest::prop_assert_eq!(active, applied);
            }
        }
    }
}
