use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::client::{AnswerService, AskError, AskResponse};
use crate::config::Settings;
use crate::state::ChatSession;
use crate::tui::AppEvent;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession,

    // Answer service and the channel its replies come back on
    service: Arc<dyn AnswerService>,
    events: mpsc::UnboundedSender<AppEvent>,

    // Transcript scroll state. `chat_max_scroll` and the sizes are filled
    // in by the renderer on every frame.
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub follow_latest: bool,
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(
        settings: &Settings,
        service: Arc<dyn AnswerService>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            session: ChatSession::new(&settings.greeting, settings.max_input_chars),

            service,
            events,

            chat_scroll: 0,
            chat_max_scroll: 0,
            follow_latest: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.service.endpoint()
    }

    pub fn is_pending(&self) -> bool {
        self.session.is_pending()
    }

    /// Send action: hands the draft to the session and, if accepted, fires
    /// a single `/ask` request in the background. The reply arrives later
    /// as `AppEvent::Answer`. Returns whether a request was issued.
    pub fn send(&mut self) -> bool {
        let Some(question) = self.session.begin_send() else {
            return false;
        };
        self.scroll_to_latest();

        tracing::info!(chars = question.chars().count(), endpoint = self.endpoint(), "sending question");

        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = service.ask(&question).await;
            // The loop is gone if this fails; nothing left to update
            let _ = events.send(AppEvent::Answer(outcome));
        });
        true
    }

    /// Response handler for the request issued by `send`.
    pub fn apply_answer(&mut self, outcome: Result<AskResponse, AskError>) {
        match &outcome {
            Ok(response) => tracing::info!(
                sources = response.sources.as_ref().map_or(0, Vec::len),
                "answer received"
            ),
            Err(e) => tracing::warn!(error = %e, "ask request failed"),
        }

        if self.session.complete(&outcome) {
            self.scroll_to_latest();
        } else {
            tracing::debug!("dropping answer with no request pending");
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Pin the transcript to its newest line; the renderer does the rest.
    pub fn scroll_to_latest(&mut self) {
        self.follow_latest = true;
        self.chat_scroll = self.chat_max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        if self.chat_scroll >= self.chat_max_scroll {
            self.follow_latest = true;
        }
    }

    pub fn page_size(&self) -> u16 {
        self.chat_height.saturating_sub(1).max(1)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Canned answer service that records every question it receives.
    pub struct FakeService {
        pub reply: Box<dyn Fn(&str) -> Result<AskResponse, AskError> + Send + Sync>,
        pub calls: AtomicUsize,
        pub questions: Mutex<Vec<String>>,
    }

    impl FakeService {
        pub fn answering(answer: &str, sources: &[&str]) -> Arc<Self> {
            let answer = answer.to_string();
            let sources: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
            Arc::new(Self {
                reply: Box::new(move |_: &str| {
                    Ok(AskResponse {
                        answer: answer.clone(),
                        sources: Some(sources.clone()),
                    })
                }),
                calls: AtomicUsize::new(0),
                questions: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Box::new(|_: &str| Err(AskError::Decode("expected value at line 1".to_string()))),
                calls: AtomicUsize::new(0),
                questions: Mutex::new(Vec::new()),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AnswerService for FakeService {
        async fn ask(&self, question: &str) -> Result<AskResponse, AskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.questions.lock().unwrap().push(question.to_string());
            (self.reply)(question)
        }

        fn endpoint(&self) -> &str {
            "http://fake.test/ask"
        }
    }

    pub fn test_settings() -> Settings {
        Settings {
            server_url: "http://fake.test".to_string(),
            greeting: crate::state::DEFAULT_GREETING.to_string(),
            max_input_chars: crate::state::DEFAULT_MAX_INPUT_CHARS,
            request_timeout: None,
        }
    }

    pub fn test_app(
        service: Arc<FakeService>,
    ) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(&test_settings(), service, tx);
        (app, rx)
    }
}
