//! Test doubles injected through the production constructors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::delivery::{DeliveryError, MailTransport, OutgoingEmail};
use crate::files::{FileStore, FileStoreError};
use crate::letter::{CoverLetter, GenerationError, LetterGenerator};
use crate::llm_client::LlmError;
use crate::models::cv::Cv;
use crate::models::job_offer::JobOffer;
use crate::models::user::User;
use crate::sms::{SmsError, SmsSender};

pub struct FakeFileStore {
    data: Option<Bytes>,
}

impl FakeFileStore {
    pub fn with_bytes(data: &'static [u8]) -> Self {
        Self {
            data: Some(Bytes::from_static(data)),
        }
    }

    pub fn missing() -> Self {
        Self { data: None }
    }
}

#[async_trait]
impl FileStore for FakeFileStore {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, FileStoreError> {
        self.data
            .clone()
            .ok_or_else(|| FileStoreError::S3(format!("NoSuchKey: {file_ref}")))
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("<msg-{}@test>", sent.len()))
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SM{}", sent.len()))
    }
}

/// Plays back a fixed sequence of outcomes; once exhausted, keeps succeeding.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<CoverLetter, GenerationError>>>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<CoverLetter, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Fails `failures` times with a retryable error, then succeeds.
    pub fn failing_times(failures: usize) -> Self {
        Self::with_script((0..failures).map(|_| Err(transient_error())).collect())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn transient_error() -> GenerationError {
    GenerationError::Backend(LlmError::Api {
        status: 503,
        message: "model overloaded".to_string(),
    })
}

pub fn sample_letter() -> CoverLetter {
    CoverLetter {
        subject: "Application for Backend Engineer".to_string(),
        body: "I am writing to apply for the Backend Engineer role.\n\nI build reliable services."
            .to_string(),
    }
}

#[async_trait]
impl LetterGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _user: &User,
        _offer: &JobOffer,
        _cv: &Cv,
    ) -> Result<CoverLetter, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(sample_letter()))
    }
}
