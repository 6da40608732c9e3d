//! Waiting for elements to leave the document.
//!
//! [`wait_for_element_to_be_removed`] validates its target, observes the
//! distinct top-most ancestors of the initial elements, re-checks removal on
//! every mutation batch, and races a single deadline. Hosts without mutation
//! observers are covered by an interval-polling fallback with the same
//! semantics. Settlement is exactly-once by construction: one sequential
//! select loop decides the outcome, and every subscription is released
//! before the result reaches the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SelectAll;
use futures::StreamExt;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::dom::Element;
use crate::observer::{MutationSubscription, ObserveMutations, ObserverOptions};
use crate::query::QueryError;
use crate::result::{EsperarError, EsperarResult};

/// Default wait deadline in milliseconds
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 1_000;

/// Default polling cadence in milliseconds, for documents that cannot
/// deliver mutation batches
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// What one resolver invocation produced.
///
/// [`Resolution::Absent`] and an empty [`Resolution::Elements`] both mean
/// "nothing there": during validation they reject the wait, during re-checks
/// they confirm removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single element
    Element(Element),
    /// A list of elements, possibly empty
    Elements(Vec<Element>),
    /// Nothing matched
    Absent,
}

impl Resolution {
    /// True when the resolution represents no remaining elements.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        match self {
            Self::Element(_) => false,
            Self::Elements(elements) => elements.is_empty(),
            Self::Absent => true,
        }
    }

    fn into_elements(self) -> Vec<Element> {
        match self {
            Self::Element(element) => vec![element],
            Self::Elements(elements) => elements,
            Self::Absent => Vec::new(),
        }
    }
}

impl From<Element> for Resolution {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<Vec<Element>> for Resolution {
    fn from(elements: Vec<Element>) -> Self {
        Self::Elements(elements)
    }
}

impl From<Option<Element>> for Resolution {
    fn from(element: Option<Element>) -> Self {
        element.map_or(Self::Absent, Self::Element)
    }
}

/// Boxed lookup invoked at validation and once per re-check.
type Resolver = Box<dyn FnMut() -> Result<Resolution, QueryError> + Send>;

/// What to watch for removal.
///
/// The direct forms hold the elements themselves and re-test their
/// connectivity on each notification. The [`WaitTarget::Resolver`] form
/// re-runs a lookup instead, so the wait follows whatever the lookup
/// currently matches.
pub enum WaitTarget {
    /// A single element held for the lifetime of the wait
    Element(Element),
    /// A list of elements held for the lifetime of the wait
    Elements(Vec<Element>),
    /// A lookup invoked once for validation and again per re-check
    Resolver(Resolver),
}

impl WaitTarget {
    /// Build a resolver target from any lookup whose success value converts
    /// into a [`Resolution`].
    ///
    /// `query_by_test_id`-style lookups compose directly:
    ///
    /// ```no_run
    /// # async fn demo() -> jugar_esperar::EsperarResult<()> {
    /// use jugar_esperar::{
    ///     query_by_test_id, wait_for_element_to_be_removed, Document, RemovalOptions, WaitTarget,
    /// };
    ///
    /// let document = Document::new();
    /// let root = document.root();
    /// wait_for_element_to_be_removed(
    ///     WaitTarget::resolver(move || query_by_test_id(&root, "spinner")),
    ///     &RemovalOptions::default(),
    /// )
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn resolver<F, R>(mut lookup: F) -> Self
    where
        F: FnMut() -> Result<R, QueryError> + Send + 'static,
        R: Into<Resolution>,
    {
        Self::Resolver(Box::new(move || lookup().map(Into::into)))
    }
}

impl From<Element> for WaitTarget {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&Element> for WaitTarget {
    fn from(element: &Element) -> Self {
        Self::Element(element.clone())
    }
}

impl From<Vec<Element>> for WaitTarget {
    fn from(elements: Vec<Element>) -> Self {
        Self::Elements(elements)
    }
}

impl From<&[Element]> for WaitTarget {
    fn from(elements: &[Element]) -> Self {
        Self::Elements(elements.to_vec())
    }
}

impl fmt::Debug for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => f.debug_tuple("Element").field(element).finish(),
            Self::Elements(elements) => f.debug_tuple("Elements").field(elements).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Hook applied to the timeout error before it is returned.
type TimeoutHook = Arc<dyn Fn(EsperarError) -> EsperarError + Send + Sync>;

/// Configuration for one wait call.
///
/// Immutable for the call's lifetime. `interval` only matters when a
/// document cannot deliver mutation batches and the waiter polls instead.
#[derive(Clone)]
pub struct RemovalOptions {
    /// Deadline for the whole wait
    pub timeout: Duration,
    /// Polling cadence for hosts without mutation observers
    pub interval: Duration,
    /// Which mutation kinds trigger re-checks
    pub observer_options: ObserverOptions,
    on_timeout: Option<TimeoutHook>,
}

impl RemovalOptions {
    /// Defaults: 1s deadline, 50ms polling cadence, observe everything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            observer_options: ObserverOptions::new(),
            on_timeout: None,
        }
    }

    /// Set the deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling cadence used when observers are unavailable.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Select which mutation kinds trigger re-checks.
    #[must_use]
    pub const fn with_observer_options(mut self, options: ObserverOptions) -> Self {
        self.observer_options = options;
        self
    }

    /// Transform or replace the timeout error before it is returned.
    ///
    /// The hook only ever sees [`EsperarError::Timeout`]; validation and
    /// passthrough errors are not subject to it.
    #[must_use]
    pub fn with_on_timeout<F>(mut self, hook: F) -> Self
    where
        F: Fn(EsperarError) -> EsperarError + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(hook));
        self
    }

    fn transform_timeout(&self, error: EsperarError) -> EsperarError {
        match &self.on_timeout {
            Some(hook) => hook(error),
            None => error,
        }
    }
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RemovalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalOptions")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("observer_options", &self.observer_options)
            .finish_non_exhaustive()
    }
}

/// How the engine reads a resolver error raised during a re-check.
#[derive(Debug, PartialEq)]
enum Classification {
    /// The lookup reports nothing matches: proof of removal
    Removal,
    /// Anything else surfaces to the caller unmodified
    Surface(QueryError),
}

/// A "not found" lookup failure means the watched element is gone; every
/// other failure is the caller's problem and keeps its identity.
fn classify(error: QueryError) -> Classification {
    if error.is_not_found() {
        Classification::Removal
    } else {
        Classification::Surface(error)
    }
}

/// The validated target, in the shape re-checks need.
enum Watch {
    Snapshot(Vec<Element>),
    Resolver(Resolver),
}

enum CheckOutcome {
    Removed,
    StillPresent,
    Failed(QueryError),
}

impl Watch {
    /// Resolve and validate the target.
    ///
    /// Returns the watch plus the initial elements whose top-most ancestors
    /// get observed. Rejects empty targets with
    /// [`EsperarError::AlreadyRemoved`] before any resource exists.
    fn validate(target: WaitTarget) -> EsperarResult<(Self, Vec<Element>)> {
        match target {
            WaitTarget::Element(element) => {
                let initial = vec![element];
                Ok((Self::Snapshot(initial.clone()), initial))
            }
            WaitTarget::Elements(elements) => {
                if elements.is_empty() {
                    return Err(EsperarError::AlreadyRemoved);
                }
                Ok((Self::Snapshot(elements.clone()), elements))
            }
            WaitTarget::Resolver(mut resolver) => {
                // The first invocation sits outside the classifier: any
                // error, not-found included, propagates unmodified.
                let resolution = resolver()?;
                if resolution.is_removed() {
                    return Err(EsperarError::AlreadyRemoved);
                }
                let initial = resolution.into_elements();
                Ok((Self::Resolver(resolver), initial))
            }
        }
    }

    fn check(&mut self) -> CheckOutcome {
        match self {
            Self::Snapshot(elements) => {
                if elements.iter().all(|element| !element.is_connected()) {
                    CheckOutcome::Removed
                } else {
                    CheckOutcome::StillPresent
                }
            }
            Self::Resolver(resolver) => match resolver() {
                Ok(resolution) if resolution.is_removed() => CheckOutcome::Removed,
                Ok(_) => CheckOutcome::StillPresent,
                Err(error) => CheckOutcome::Failed(error),
            },
        }
    }
}

/// One re-check; `Ok(true)` means removal is confirmed.
fn recheck(watch: &mut Watch) -> EsperarResult<bool> {
    match watch.check() {
        CheckOutcome::Removed => Ok(true),
        CheckOutcome::StillPresent => Ok(false),
        CheckOutcome::Failed(error) => match classify(error) {
            Classification::Removal => Ok(true),
            Classification::Surface(error) => Err(EsperarError::Query(error)),
        },
    }
}

/// Distinct top-most ancestors of the initial elements, at validation time.
fn observation_roots(initial: &[Element]) -> Vec<Element> {
    let mut roots: Vec<Element> = Vec::new();
    for element in initial {
        let root = element.top_most_ancestor();
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

/// Wait until every element represented by `target` is detached from its
/// document, or fail once `options.timeout` elapses.
///
/// Validation happens first: an empty target rejects immediately with
/// [`EsperarError::AlreadyRemoved`], before any subscription or timer
/// exists. The engine then subscribes one mutation observer per distinct
/// top-most ancestor of the initial elements, re-checks on every batch, and
/// races a single deadline; roots whose document cannot deliver mutation
/// batches are covered by polling at `options.interval`. A resolver error
/// during a re-check is classified: a not-found lookup failure confirms
/// removal, anything else rejects with that exact error value.
///
/// Whichever way the call settles, every subscription and the timer are
/// released before it returns.
///
/// # Errors
///
/// - [`EsperarError::AlreadyRemoved`] when the target is empty at entry.
/// - [`EsperarError::Query`] when the resolver fails at entry, or a re-check
///   failure is not a not-found signal.
/// - [`EsperarError::Timeout`] (after `on_timeout`) when the deadline wins.
pub async fn wait_for_element_to_be_removed(
    target: impl Into<WaitTarget>,
    options: &RemovalOptions,
) -> EsperarResult<()> {
    let (mut watch, initial) = match Watch::validate(target.into()) {
        Ok(validated) => validated,
        Err(error) => {
            debug!("target rejected at validation");
            return Err(error);
        }
    };
    let roots = observation_roots(&initial);

    let mut notifications = SelectAll::new();
    let mut polling = false;
    for root in &roots {
        match root.document().observe(root, options.observer_options) {
            Some(subscription) => notifications.push(subscription),
            None => polling = true,
        }
    }
    debug!(
        roots = roots.len(),
        observers = notifications.len(),
        polling,
        "waiting for element removal"
    );

    let result = drive(&mut watch, &mut notifications, polling, options).await;
    // Tear down every subscription before reporting the outcome.
    drop(notifications);

    match result {
        Ok(()) => {
            debug!("removal confirmed");
            Ok(())
        }
        Err(EsperarError::Timeout) => {
            debug!(timeout = ?options.timeout, "wait timed out");
            Err(options.transform_timeout(EsperarError::Timeout))
        }
        Err(error) => {
            debug!("resolver error surfaced");
            Err(error)
        }
    }
}

async fn drive(
    watch: &mut Watch,
    notifications: &mut SelectAll<MutationSubscription>,
    mut polling: bool,
    options: &RemovalOptions,
) -> EsperarResult<()> {
    // The target may already be gone by the time observers are in place.
    if recheck(watch)? {
        return Ok(());
    }

    let deadline = time::sleep(options.timeout);
    tokio::pin!(deadline);

    // Zero-period intervals are invalid; clamp to the smallest usable tick.
    let period = options.interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut use_observers = !notifications.is_empty();

    loop {
        tokio::select! {
            biased;

            batch = notifications.next(), if use_observers => match batch {
                Some(batch) => {
                    trace!(records = batch.records.len(), "mutation batch");
                    if recheck(watch)? {
                        return Ok(());
                    }
                }
                // Every notification source is gone; keep the wait live by
                // polling instead.
                None => {
                    use_observers = false;
                    polling = true;
                }
            },

            _ = ticker.tick(), if polling => {
                trace!("poll tick");
                if recheck(watch)? {
                    return Ok(());
                }
            }

            () = &mut deadline => return Err(EsperarError::Timeout),
        }
    }
}
