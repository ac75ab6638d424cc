//! Sandbox isolation and bridge-surface tests

#[cfg(test)]
mod tests {
    use minigame_host::protocol::BridgeMessage;
    use minigame_host::sandbox::{SandboxInstance, SandboxPolicy};

    fn mount(source: &str) -> SandboxInstance {
        SandboxInstance::mount(source, &SandboxPolicy::default())
    }

    // -----------------------------------------------------------------------
    // Bridge surface
    // -----------------------------------------------------------------------

    #[test]
    fn script_reports_flow_out_as_envelopes() {
        let mut instance = mount(
            r#"
            report_score(10.0);
            report_score(20.0);
            report_complete(20.0);
            "#,
        );
        assert!(!instance.load_failed());

        let envelopes = instance.drain(3);
        assert_eq!(envelopes.len(), 3);
        for envelope in &envelopes {
            assert_eq!(&envelope.origin, instance.origin());
            assert_eq!(envelope.frame, 3);
        }
        assert_eq!(envelopes[0].message, BridgeMessage::Score { value: 10.0 });
        assert_eq!(
            envelopes[2].message,
            BridgeMessage::Complete { final_score: 20.0 }
        );

        // Drained means drained.
        assert!(instance.drain(4).is_empty());
    }

    #[test]
    fn integer_literals_are_accepted() {
        let mut instance = mount("report_score(40); report_complete(80);");
        assert!(!instance.load_failed());

        let envelopes = instance.drain(0);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].message, BridgeMessage::Score { value: 40.0 });
        assert_eq!(
            envelopes[1].message,
            BridgeMessage::Complete { final_score: 80.0 }
        );
    }

    #[test]
    fn event_payloads_become_json() {
        let mut instance = mount(r#"report_event("milestone", #{ level: 2 });"#);
        let envelopes = instance.drain(0);
        assert_eq!(envelopes.len(), 1);
        match &envelopes[0].message {
            BridgeMessage::Event { name, payload } => {
                assert_eq!(name, "milestone");
                assert_eq!(payload["level"], 2);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn payload_less_events_carry_null() {
        let mut instance = mount(r#"report_event("started");"#);
        let envelopes = instance.drain(0);
        assert_eq!(
            envelopes[0].message,
            BridgeMessage::Event {
                name: "started".into(),
                payload: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn invalid_values_are_dropped_at_source() {
        let mut instance = mount(
            r#"
            report_score(-5.0);
            report_score(1.0 / 0.0);
            report_complete(-1);
            "#,
        );
        assert!(!instance.load_failed());
        assert!(instance.drain(0).is_empty());
    }

    // -----------------------------------------------------------------------
    // Containment
    // -----------------------------------------------------------------------

    #[test]
    fn parse_errors_are_contained() {
        let instance = mount("this is not a valid script ][");
        assert!(instance.load_failed());
    }

    #[test]
    fn runtime_errors_keep_earlier_messages() {
        let mut instance = mount(
            r#"
            report_score(5.0);
            fetch("https://external.example/steal");
            "#,
        );
        // The unknown `fetch` symbol aborts the run...
        assert!(instance.load_failed());
        // ...but the messages queued before it survive.
        let envelopes = instance.drain(0);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].message, BridgeMessage::Score { value: 5.0 });
    }

    #[test]
    fn runaway_loops_hit_the_operation_budget() {
        let instance = SandboxInstance::mount("loop { }", &SandboxPolicy::strict());
        assert!(instance.load_failed());
    }

    #[test]
    fn oversized_strings_hit_the_size_ceiling() {
        let instance = SandboxInstance::mount(
            r#"
            let s = "x";
            loop { s += s; }
            "#,
            &SandboxPolicy::strict(),
        );
        assert!(instance.load_failed());
    }

    // -----------------------------------------------------------------------
    // Origin & lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn every_instance_gets_a_distinct_origin() {
        let a = mount("report_score(1.0);");
        let b = mount("report_score(1.0);");
        assert_ne!(a.origin(), b.origin());
    }

    #[test]
    fn teardown_is_idempotent_and_final() {
        let mut instance = mount("report_score(1.0);");
        instance.teardown();
        instance.teardown();
        assert!(instance.is_torn_down());
        assert!(instance.drain(0).is_empty());
    }

    #[test]
    fn teardown_discards_unread_messages() {
        let mut instance = mount("report_score(1.0); report_score(2.0);");
        instance.teardown();
        assert!(instance.drain(0).is_empty());
    }
}
