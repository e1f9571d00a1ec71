// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_lite::future::yield_now;

use crate::tiles::GeodataTransport;
use crate::{Continuation, OptionManager, TileService};

/// One-shot flag telling a [LookaheadTask] to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Result of a [LookaheadTask].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookaheadOutcome {
    /// All offered options have been walked.
    Completed,

    /// The current segment changed before the walk finished.
    Cancelled,
}

/// Background computation of the continuations following each offered option.
///
/// The task must be driven by the host's (single-threaded) executor.
/// Dropping it without polling simply skips the lookahead.
#[must_use = "lookahead tasks do nothing unless polled"]
pub struct LookaheadTask {
    inner: Pin<Box<dyn Future<Output = LookaheadOutcome>>>,
}

impl LookaheadTask {
    pub(super) fn new<T: GeodataTransport + 'static>(
        tiles: Rc<TileService<T>>,
        offered: Rc<RefCell<Vec<Continuation>>>,
        token: CancellationToken,
        hop_limit: usize,
    ) -> Self {
        let inner = Box::pin(async move {
            let count = offered.borrow().len();
            for i in 0..count {
                let Some(option) = offered.borrow().get(i).cloned() else {
                    break;
                };
                if option.next.is_some() {
                    continue;
                }

                let Some(walked) = walk(&tiles, option, &token, hop_limit).await else {
                    log::debug!("lookahead cancelled");
                    return LookaheadOutcome::Cancelled;
                };

                if token.is_cancelled() {
                    return LookaheadOutcome::Cancelled;
                }
                if let Some(slot) = offered.borrow_mut().get_mut(i) {
                    *slot = walked;
                }
            }

            LookaheadOutcome::Completed
        });

        Self { inner }
    }
}

impl Future for LookaheadTask {
    type Output = LookaheadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for LookaheadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookaheadTask").finish_non_exhaustive()
    }
}

/// Follows `leg` through all single continuations, until a real choice
/// is found and stored in [Continuation::next].
///
/// At a dead end, the leg is turned around once (if its way may be travelled
/// backwards) and the walk continues along the reversed leg, which then becomes
/// the only lookahead option. If the hop limit is reached first,
/// the lookahead is left unset.
///
/// Returns `None` if cancelled.
async fn walk<T: GeodataTransport>(
    tiles: &TileService<T>,
    mut leg: Continuation,
    token: &CancellationToken,
    hop_limit: usize,
) -> Option<Continuation> {
    let area = match leg.area.clone() {
        Some(area) => area,
        None => tiles.load(leg.tail()?.pos).await?,
    };
    let mut manager = OptionManager::new(tiles, area);
    let mut turned: Option<Continuation> = None;

    for _ in 0..hop_limit {
        yield_now().await;
        if token.is_cancelled() {
            return None;
        }

        let walked = turned.as_mut().unwrap_or(&mut leg);
        let mut next = manager.get_next_options(walked).await;
        if token.is_cancelled() {
            return None;
        }

        match next.len() {
            0 => {
                if turned.is_some() {
                    break;
                }
                match manager.reverse(&leg) {
                    Some(back) => {
                        log::debug!("dead end on {}, turning around", leg.way_id);
                        turned = Some(back);
                    }
                    None => {
                        leg.next = Some(Vec::new());
                        break;
                    }
                }
            }

            1 => {
                if let Some(n) = next.pop() {
                    walked.splice(n);
                }
            }

            _ => {
                walked.next = Some(next);
                break;
            }
        }
    }

    if let Some(back) = turned {
        leg.next = Some(vec![back]);
    }
    Some(leg)
}
