//! Termination: closing words for each way a call can end

use voice_support_config::prompt_keys;
use voice_support_text_processing::PromptParams;

use super::PromptPlan;
use crate::session::{Ending, EscalationReason, Session};

/// Prompts played once before the call is released
pub fn farewell_plan(session: &Session, personalize: bool) -> PromptPlan {
    match session.ending.unwrap_or(Ending::Goodbye) {
        Ending::Goodbye => match session.name_for_prompts(personalize) {
            Some(name) => PromptPlan::say_with(
                prompt_keys::FAREWELL_NAMED,
                PromptParams::new().with("name", name),
            ),
            None => PromptPlan::say(prompt_keys::FAREWELL),
        },
        Ending::TurnLimit => PromptPlan::say(prompt_keys::GUARD_TURN_LIMIT),
        Ending::TimeLimit => PromptPlan::say(prompt_keys::GUARD_TIME_LIMIT),
        Ending::Transferred(EscalationReason::Complaint) => {
            PromptPlan::say(prompt_keys::ESCALATION_COMPLAINT)
        }
        Ending::Transferred(EscalationReason::ProviderFailure) => {
            PromptPlan::say(prompt_keys::SPEECH_FAILURE)
        }
        Ending::Transferred(_) => PromptPlan::say(prompt_keys::ESCALATION_TRANSFER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farewell_by_ending() {
        let mut session = Session::new("c");
        assert_eq!(farewell_plan(&session, true).keys(), vec![prompt_keys::FAREWELL]);

        session.slots.caller_name = Some("Анна".into());
        session.ending = Some(Ending::Goodbye);
        assert_eq!(
            farewell_plan(&session, true).keys(),
            vec![prompt_keys::FAREWELL_NAMED]
        );
        assert_eq!(farewell_plan(&session, false).keys(), vec![prompt_keys::FAREWELL]);

        let cases = [
            (Ending::TurnLimit, prompt_keys::GUARD_TURN_LIMIT),
            (Ending::TimeLimit, prompt_keys::GUARD_TIME_LIMIT),
            (
                Ending::Transferred(EscalationReason::Complaint),
                prompt_keys::ESCALATION_COMPLAINT,
            ),
            (
                Ending::Transferred(EscalationReason::ProviderFailure),
                prompt_keys::SPEECH_FAILURE,
            ),
            (
                Ending::Transferred(EscalationReason::AddressUnresolved),
                prompt_keys::ESCALATION_TRANSFER,
            ),
        ];
        for (ending, key) in cases {
            session.ending = Some(ending);
            assert_eq!(farewell_plan(&session, true).keys(), vec![key]);
        }
    }
}
