use std::collections::HashMap;
use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::config::*;
use crate::SurveySession;

/// The identifier handed out to a respondent for one session.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        SessionToken(s.to_string())
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sessions in progress, keyed by token.
///
/// A respondent who comes back with the same token resumes where they left. A session is
/// dropped as soon as its answers are committed.
pub struct SessionRegistry {
    policy: ValidationPolicy,
    sessions: HashMap<SessionToken, SurveySession>,
    issued: u64,
}

impl SessionRegistry {
    pub fn new(policy: ValidationPolicy) -> SessionRegistry {
        SessionRegistry {
            policy,
            sessions: HashMap::new(),
            issued: 0,
        }
    }

    /// Starts a new session over the form and returns its token.
    pub fn open(&mut self, form: &Form) -> Result<SessionToken, SessionErrors> {
        let session = SurveySession::new(form, self.policy)?;
        self.issued += 1;
        let token = issue_token(&form.slug(), self.issued);
        debug!("open: session {} for form {:?}", token, form.slug());
        self.sessions.insert(token.clone(), session);
        Ok(token)
    }

    /// Returns the token if the session is still in progress, or opens a new one.
    pub fn resume_or_open(
        &mut self,
        token: Option<&SessionToken>,
        form: &Form,
    ) -> Result<SessionToken, SessionErrors> {
        match token {
            Some(t) if self.sessions.get(t).map(|s| s.form() == form) == Some(true) => {
                debug!("resume_or_open: resuming session {}", t);
                Ok(t.clone())
            }
            _ => self.open(form),
        }
    }

    pub fn get(&self, token: &SessionToken) -> Result<&SurveySession, SessionErrors> {
        self.sessions
            .get(token)
            .ok_or_else(|| SessionErrors::UnknownSession(token.to_string()))
    }

    pub fn get_mut(&mut self, token: &SessionToken) -> Result<&mut SurveySession, SessionErrors> {
        self.sessions
            .get_mut(token)
            .ok_or_else(|| SessionErrors::UnknownSession(token.to_string()))
    }

    /// Submits the session and forgets it if the submission went through.
    pub fn submit<S: ResponseSink>(
        &mut self,
        token: &SessionToken,
        sink: &S,
    ) -> Result<ResponseRow, SubmitErrors<S::Error>> {
        let row = self.get_mut(token)?.submit(sink)?;
        self.sessions.remove(token);
        debug!("submit: session {} closed", token);
        Ok(row)
    }

    /// Drops a session without storing anything. Returns false for an unknown token.
    pub fn abandon(&mut self, token: &SessionToken) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn issue_token(slug: &str, counter: u64) -> SessionToken {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    SessionToken(sha256::digest(format!("{}:{}:{}", slug, counter, nanos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CountingSink(RefCell<usize>);

    impl ResponseSink for CountingSink {
        type Error = String;
        fn append(&self, _form: &Form, _row: &ResponseRow) -> Result<(), String> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    fn form() -> Form {
        Form {
            title: "Lunch".to_string(),
            questions: vec![Question::text("What did you eat?"), Question::scale("How good?")],
        }
    }

    #[test]
    fn tokens_are_distinct() {
        let mut r = SessionRegistry::new(ValidationPolicy::PERMISSIVE);
        let t1 = r.open(&form()).unwrap();
        let t2 = r.open(&form()).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(t1.as_str().len(), 64);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn sessions_are_independent() {
        let mut r = SessionRegistry::new(ValidationPolicy::PERMISSIVE);
        let t1 = r.open(&form()).unwrap();
        let t2 = r.open(&form()).unwrap();
        r.get_mut(&t1)
            .unwrap()
            .set_answer(Answer::Text("Soup".to_string()))
            .unwrap();
        r.get_mut(&t1).unwrap().next();
        assert_eq!(r.get(&t1).unwrap().current_index(), Ok(1));
        assert_eq!(r.get(&t2).unwrap().current_index(), Ok(0));
        assert_eq!(r.get(&t2).unwrap().answers()[0], None);
    }

    #[test]
    fn resume_keeps_progress() {
        let mut r = SessionRegistry::new(ValidationPolicy::PERMISSIVE);
        let t = r.open(&form()).unwrap();
        r.get_mut(&t).unwrap().next();
        let t2 = r.resume_or_open(Some(&t), &form()).unwrap();
        assert_eq!(t, t2);
        assert_eq!(r.get(&t2).unwrap().current_index(), Ok(1));

        let t3 = r.resume_or_open(Some(&SessionToken::from("nope")), &form()).unwrap();
        assert_ne!(t3, t);
        assert_eq!(r.get(&t3).unwrap().current_index(), Ok(0));
    }

    #[test]
    fn submit_closes_the_session() {
        let mut r = SessionRegistry::new(ValidationPolicy::PERMISSIVE);
        let sink = CountingSink(RefCell::new(0));
        let t = r.open(&form()).unwrap();
        r.get_mut(&t).unwrap().next();
        r.submit(&t, &sink).unwrap();
        assert_eq!(*sink.0.borrow(), 1);
        assert!(r.is_empty());
        assert!(matches!(
            r.submit(&t, &sink),
            Err(SubmitErrors::Session(SessionErrors::UnknownSession(_)))
        ));
    }

    #[test]
    fn rejected_submit_keeps_the_session() {
        let mut r = SessionRegistry::new(ValidationPolicy::STRICT);
        let sink = CountingSink(RefCell::new(0));
        let t = r.open(&form()).unwrap();
        r.get_mut(&t).unwrap().next();
        assert!(r.submit(&t, &sink).is_err());
        assert_eq!(r.len(), 1);
        assert_eq!(*sink.0.borrow(), 0);
    }

    #[test]
    fn abandon() {
        let mut r = SessionRegistry::new(ValidationPolicy::PERMISSIVE);
        let t = r.open(&form()).unwrap();
        assert!(r.abandon(&t));
        assert!(!r.abandon(&t));
        assert!(r.get(&t).is_err());
    }
}
