//! Ask orchestration
//!
//! Walks the ranked candidate list for one Ask. Every candidate gets at
//! most one call under its configured deadline; per-provider failures
//! drive fallback and health updates, never a caller-visible error.
//! Worst-case latency is one deadline per candidate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sage_config::{Config, ProviderKind};
use tokio_util::sync::CancellationToken;

use crate::classify;
use crate::error::{AttemptFailure, RouteError};
use crate::event::{self, AskEvent};
use crate::health::{CircuitState, HealthTracker};
use crate::normalize;
use crate::provider::ProviderClient;
use crate::provider::anthropic::AnthropicClient;
use crate::provider::google::GoogleClient;
use crate::provider::ollama::OllamaClient;
use crate::provider::openai::OpenAiClient;
use crate::rank;
use crate::types::{AnswerEnvelope, AskRequest, Prompt, SelectionReason};

/// Routes Asks across the configured providers
///
/// Cheap to clone; concurrent Asks share only the health tracker.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    clients: HashMap<String, Arc<dyn ProviderClient>>,
    health: HealthTracker,
}

impl Dispatcher {
    /// Build a dispatcher from configuration, constructing one adapter
    /// per configured provider
    pub fn from_config(config: Config) -> Self {
        let clients = config
            .providers
            .iter()
            .map(|(name, provider_config)| {
                let client: Arc<dyn ProviderClient> = match provider_config.kind {
                    ProviderKind::Openai => {
                        Arc::new(OpenAiClient::new(name.clone(), provider_config))
                    }
                    ProviderKind::Anthropic => {
                        Arc::new(AnthropicClient::new(name.clone(), provider_config))
                    }
                    ProviderKind::Google => {
                        Arc::new(GoogleClient::new(name.clone(), provider_config))
                    }
                    ProviderKind::Ollama => {
                        Arc::new(OllamaClient::new(name.clone(), provider_config))
                    }
                };
                (name.clone(), client)
            })
            .collect();

        let health = HealthTracker::new(config.circuit.clone());
        Self::new(config, clients, health)
    }

    /// Build a dispatcher from explicit parts
    ///
    /// The seam used by tests to inject scripted clients and a health
    /// tracker driven by a manual clock.
    pub fn new(
        config: Config,
        clients: HashMap<String, Arc<dyn ProviderClient>>,
        health: HealthTracker,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clients,
                health,
            }),
        }
    }

    /// Shared provider health state
    pub fn health(&self) -> &HealthTracker {
        &self.inner.health
    }

    /// Answer one question, falling back across providers as needed
    ///
    /// # Errors
    ///
    /// Returns `RouteError::NoProviders` or `RouteError::UnknownProvider`
    /// before any network call for configuration problems, and
    /// `RouteError::Exhausted` when every candidate failed.
    pub async fn ask(&self, request: AskRequest) -> Result<AnswerEnvelope, RouteError> {
        self.ask_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Answer one question, aborting promptly if `cancel` fires
    ///
    /// Cancellation stops the candidate walk and drops the in-flight
    /// provider call rather than letting it run to completion in the
    /// background.
    ///
    /// # Errors
    ///
    /// As [`Self::ask`], plus `RouteError::Cancelled`.
    #[allow(clippy::too_many_lines)]
    pub async fn ask_with_cancellation(
        &self,
        request: AskRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerEnvelope, RouteError> {
        let started = Instant::now();
        let inner = &*self.inner;

        if inner.config.providers.is_empty() {
            emit_failure(&[], started.elapsed(), "configuration_error");
            return Err(RouteError::NoProviders);
        }

        if let Some(forced) = request.provider_override.as_deref()
            && !inner.config.providers.contains_key(forced)
        {
            emit_failure(&[], started.elapsed(), "configuration_error");
            return Err(RouteError::UnknownProvider {
                provider: forced.to_owned(),
            });
        }

        let category = classify::classify(&request.question);
        let candidates = rank::rank(
            &inner.config.providers,
            category,
            &inner.config.routing,
            &inner.health,
            request.provider_override.as_deref(),
        );

        tracing::debug!(
            category = %category,
            candidates = ?candidates.providers,
            last_resort = candidates.last_resort,
            "candidate list built"
        );

        let prompt = Prompt {
            question: request.question.clone(),
            locale: request.locale.clone(),
        };
        let mut discarded: Vec<AttemptFailure> = Vec::new();
        let mut tried: Vec<String> = Vec::new();

        for name in &candidates.providers {
            if cancel.is_cancelled() {
                return Err(RouteError::Cancelled);
            }

            let probing = inner.health.circuit_state(name) == CircuitState::HalfOpen;
            if probing && !inner.health.try_begin_probe(name) {
                tracing::debug!(provider = %name, "half-open probe already in flight, skipping");
                continue;
            }

            let Some(client) = inner.clients.get(name) else {
                if probing {
                    inner.health.cancel_probe(name);
                }
                continue;
            };
            let Some(provider_config) = inner.config.providers.get(name) else {
                if probing {
                    inner.health.cancel_probe(name);
                }
                continue;
            };

            let model = request
                .model_override
                .clone()
                .unwrap_or_else(|| provider_config.default_model.clone());
            let deadline = Duration::from_millis(provider_config.timeout_ms);

            tried.push(name.clone());
            let call_started = Instant::now();
            let result = tokio::select! {
                () = cancel.cancelled() => {
                    if probing {
                        inner.health.cancel_probe(name);
                    }
                    return Err(RouteError::Cancelled);
                }
                result = client.call(&prompt, &model, provider_config.max_tokens, deadline) => result,
            };
            let latency = call_started.elapsed();

            let accepted = result.and_then(|raw| {
                normalize::normalize(&raw.content, inner.config.routing.min_content_len)
                    .map(|content| (content, raw.model))
            });

            match accepted {
                Ok((content, model)) => {
                    inner.health.record_success(name, latency);

                    let reason = if candidates.last_resort {
                        SelectionReason::LastResort
                    } else if request.provider_override.as_deref() == Some(name.as_str()) {
                        SelectionReason::Override
                    } else if let Some(previous) = discarded.last() {
                        SelectionReason::Fallback {
                            from: previous.provider.clone(),
                        }
                    } else {
                        SelectionReason::Affinity(category)
                    };

                    let envelope = AnswerEnvelope {
                        content,
                        provider: name.clone(),
                        model,
                        elapsed: started.elapsed(),
                        reason,
                        discarded,
                    };

                    event::emit(&AskEvent {
                        tried: &tried,
                        selected_provider: Some(&envelope.provider),
                        selected_model: Some(&envelope.model),
                        elapsed: envelope.elapsed,
                        outcome: "accepted",
                        reason: Some(&envelope.reason),
                    });
                    return Ok(envelope);
                }
                Err(failure) => {
                    inner.health.record_failure(name);
                    if failure.config_suspect() {
                        tracing::warn!(
                            provider = %name,
                            error = %failure,
                            "provider failure looks like a configuration problem"
                        );
                    } else {
                        tracing::warn!(
                            provider = %name,
                            error = %failure,
                            "provider failed, advancing to next candidate"
                        );
                    }
                    discarded.push(AttemptFailure {
                        provider: name.clone(),
                        failure,
                    });
                }
            }
        }

        emit_failure(&tried, started.elapsed(), "exhausted");
        Err(RouteError::Exhausted {
            attempts: discarded,
        })
    }
}

fn emit_failure(tried: &[String], elapsed: Duration, outcome: &'static str) {
    event::emit(&AskEvent {
        tried,
        selected_provider: None,
        selected_model: None,
        elapsed,
        outcome,
        reason: None,
    });
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use indexmap::IndexMap;
    use sage_config::{Capability, Category, CircuitConfig, ProviderConfig, RoutingConfig};

    use super::*;
    use crate::error::{CallFailure, FailureKind};
    use crate::types::RawCompletion;

    /// Test client that replays a scripted sequence of outcomes
    struct ScriptedClient {
        name: String,
        outcomes: Mutex<VecDeque<Result<RawCompletion, CallFailure>>>,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn new(name: &str, outcomes: Vec<Result<RawCompletion, CallFailure>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
                delay: None,
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                outcomes: Mutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    fn answer(text: &str) -> Result<RawCompletion, CallFailure> {
        Ok(RawCompletion {
            content: text.to_owned(),
            model: "scripted-model".to_owned(),
        })
    }

    #[async_trait]
    impl ProviderClient for ScriptedClient {
        fn name(&self) -> &str {
            &self.name
        }

        async fn call(
            &self,
            _prompt: &Prompt,
            _model: &str,
            _max_tokens: u32,
            _deadline: Duration,
        ) -> Result<RawCompletion, CallFailure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcomes
                .lock()
                .expect("scripted outcomes lock")
                .pop_front()
                .unwrap_or_else(|| answer("scripted answer"))
        }
    }

    fn provider_entry(capabilities: Vec<Capability>) -> ProviderConfig {
        ProviderConfig {
            kind: sage_config::ProviderKind::Openai,
            api_key: None,
            base_url: None,
            default_model: "default-model".to_owned(),
            max_tokens: 1_024,
            timeout_ms: 5_000,
            capabilities,
        }
    }

    fn dispatcher_with(
        entries: Vec<(&str, Vec<Capability>, Arc<ScriptedClient>)>,
    ) -> Dispatcher {
        let mut providers = IndexMap::new();
        let mut clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        for (name, capabilities, client) in entries {
            providers.insert(name.to_owned(), provider_entry(capabilities));
            clients.insert(name.to_owned(), client);
        }
        let config = Config {
            providers,
            routing: RoutingConfig::default(),
            circuit: CircuitConfig::default(),
        };
        let health = HealthTracker::new(config.circuit.clone());
        Dispatcher::new(config, clients, health)
    }

    #[tokio::test]
    async fn no_providers_is_a_configuration_error() {
        let dispatcher = dispatcher_with(vec![]);
        let error = dispatcher
            .ask(AskRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(error, RouteError::NoProviders));
        assert!(error.is_configuration());
    }

    #[tokio::test]
    async fn unknown_override_fails_before_any_call() {
        let client = ScriptedClient::new("claude", vec![]);
        let dispatcher = dispatcher_with(vec![(
            "claude",
            vec![Capability::General],
            Arc::clone(&client),
        )]);

        let mut request = AskRequest::new("hello");
        request.provider_override = Some("gpt5".to_owned());

        let error = dispatcher.ask(request).await.unwrap_err();
        assert!(matches!(error, RouteError::UnknownProvider { ref provider } if provider == "gpt5"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn code_question_selects_code_provider_by_affinity() {
        let claude = ScriptedClient::new("claude", vec![answer("claude answer")]);
        let deepseek = ScriptedClient::new("deepseek", vec![answer("def bubble_sort(items): ...")]);
        let dispatcher = dispatcher_with(vec![
            ("claude", vec![Capability::General], Arc::clone(&claude)),
            (
                "deepseek",
                vec![Capability::Code, Capability::Math],
                Arc::clone(&deepseek),
            ),
        ]);

        let envelope = dispatcher
            .ask(AskRequest::new("write a bubble sort in Python"))
            .await
            .unwrap();

        assert_eq!(envelope.provider, "deepseek");
        assert_eq!(envelope.reason, SelectionReason::Affinity(Category::Code));
        assert!(envelope.discarded.is_empty());
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn transport_error_falls_back_with_one_discarded_attempt() {
        let claude = ScriptedClient::new(
            "claude",
            vec![Err(CallFailure::Transport("connection reset".to_owned()))],
        );
        let qwen = ScriptedClient::new("qwen", vec![answer("今天晴，22度。")]);
        let dispatcher = dispatcher_with(vec![
            ("claude", vec![Capability::General], Arc::clone(&claude)),
            ("qwen", vec![Capability::Chinese], Arc::clone(&qwen)),
        ]);

        let mut request = AskRequest::new("今天天气怎么样");
        request.provider_override = Some("claude".to_owned());

        let envelope = dispatcher.ask(request).await.unwrap();

        assert_eq!(envelope.provider, "qwen");
        assert_eq!(envelope.discarded.len(), 1);
        assert_eq!(envelope.discarded[0].provider, "claude");
        assert_eq!(envelope.discarded[0].failure.kind(), FailureKind::Transport);
        assert_eq!(
            envelope.reason,
            SelectionReason::Fallback {
                from: "claude".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn override_success_reason_is_override() {
        let claude = ScriptedClient::new("claude", vec![answer("an answer")]);
        let qwen = ScriptedClient::new("qwen", vec![]);
        let dispatcher = dispatcher_with(vec![
            ("claude", vec![Capability::General], Arc::clone(&claude)),
            ("qwen", vec![Capability::Chinese], Arc::clone(&qwen)),
        ]);

        let mut request = AskRequest::new("今天天气怎么样");
        request.provider_override = Some("claude".to_owned());

        let envelope = dispatcher.ask(request).await.unwrap();
        assert_eq!(envelope.provider, "claude");
        assert_eq!(envelope.reason, SelectionReason::Override);
        assert_eq!(qwen.calls(), 0);
    }

    #[tokio::test]
    async fn all_auth_errors_exhaust_with_ordered_attempts() {
        let auth_err = || Err(CallFailure::Auth("key rejected".to_owned()));
        let a = ScriptedClient::new("a", vec![auth_err()]);
        let b = ScriptedClient::new("b", vec![auth_err()]);
        let c = ScriptedClient::new("c", vec![auth_err()]);
        let dispatcher = dispatcher_with(vec![
            ("a", vec![Capability::General], Arc::clone(&a)),
            ("b", vec![Capability::General], Arc::clone(&b)),
            ("c", vec![Capability::General], Arc::clone(&c)),
        ]);

        let error = dispatcher.ask(AskRequest::new("hello there")).await.unwrap_err();

        let RouteError::Exhausted { attempts } = error else {
            panic!("expected Exhausted, got {error:?}");
        };
        assert_eq!(attempts.len(), 3);
        let order: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(attempts.iter().all(|a| a.failure.kind() == FailureKind::Auth));
    }

    #[tokio::test]
    async fn empty_answer_is_a_failure_and_triggers_fallback() {
        let first = ScriptedClient::new("first", vec![answer("   \n ")]);
        let second = ScriptedClient::new("second", vec![answer("a real answer")]);
        let dispatcher = dispatcher_with(vec![
            ("first", vec![Capability::General], Arc::clone(&first)),
            ("second", vec![Capability::General], Arc::clone(&second)),
        ]);

        let envelope = dispatcher.ask(AskRequest::new("hello there")).await.unwrap();
        assert_eq!(envelope.provider, "second");
        assert_eq!(
            envelope.discarded[0].failure.kind(),
            FailureKind::EmptyOrMalformed
        );
    }

    #[tokio::test]
    async fn each_provider_tried_at_most_once() {
        let timeout = || Err(CallFailure::Timeout(Duration::from_secs(5)));
        let a = ScriptedClient::new("a", vec![timeout()]);
        let b = ScriptedClient::new("b", vec![timeout()]);
        let dispatcher = dispatcher_with(vec![
            ("a", vec![Capability::General], Arc::clone(&a)),
            ("b", vec![Capability::General], Arc::clone(&b)),
        ]);

        let error = dispatcher.ask(AskRequest::new("hello there")).await.unwrap_err();
        assert!(matches!(error, RouteError::Exhausted { ref attempts } if attempts.len() == 2));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn last_resort_when_every_circuit_is_open() {
        let claude = ScriptedClient::new("claude", vec![answer("recovered")]);
        let dispatcher = dispatcher_with(vec![(
            "claude",
            vec![Capability::General],
            Arc::clone(&claude),
        )]);

        for _ in 0..CircuitConfig::default().threshold {
            dispatcher.health().record_failure("claude");
        }
        assert!(!dispatcher.health().is_available("claude"));

        let envelope = dispatcher.ask(AskRequest::new("hello there")).await.unwrap();
        assert_eq!(envelope.provider, "claude");
        assert_eq!(envelope.reason, SelectionReason::LastResort);
        // The accepted answer closed the circuit again
        assert!(dispatcher.health().is_available("claude"));
    }

    #[tokio::test]
    async fn pre_cancelled_ask_makes_no_calls() {
        let claude = ScriptedClient::new("claude", vec![]);
        let dispatcher = dispatcher_with(vec![(
            "claude",
            vec![Capability::General],
            Arc::clone(&claude),
        )]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = dispatcher
            .ask_with_cancellation(AskRequest::new("hello"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(error, RouteError::Cancelled));
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_in_flight_call() {
        let slow = ScriptedClient::slow("slow", Duration::from_secs(600));
        let dispatcher = dispatcher_with(vec![(
            "slow",
            vec![Capability::General],
            Arc::clone(&slow),
        )]);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let error = dispatcher
            .ask_with_cancellation(AskRequest::new("hello"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(error, RouteError::Cancelled));
        assert_eq!(slow.calls(), 1);
    }
}
