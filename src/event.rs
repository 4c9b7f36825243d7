//! 型付きイベントチャネルモジュール
//! 盤面やセッションがそれぞれ所有する購読者レジストリ。
//! 購読するとトークンが返り、そのトークンでのみ購読を解除できる。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// 購読者が登録するコールバック
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    subscribers: Vec<(u64, EventCallback<T>)>,
}

/// トークンから型を消して購読解除するためのtrait
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

impl<T: 'static> Unsubscribe for Mutex<Registry<T>> {
    fn unsubscribe(&self, id: u64) {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        registry.subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
    }
}

/// 1種類のイベントを0個以上の購読者へ配信するチャネル
/// 配信はバッファリングせず、登録順に同期的に呼び出す
pub struct Event<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// コールバックを登録し、購読解除用のトークンを返す
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));

        let handle: Weak<dyn Unsubscribe> = Arc::downgrade(&self.registry) as Weak<dyn Unsubscribe>;

        Subscription { id, handle }
    }

    /// 全購読者へイベントを配信する
    /// コールバック内から購読・解除できるよう、ロックを外してから呼び出す
    pub fn dispatch(&self, details: &T) {
        let callbacks: Vec<EventCallback<T>> = self
            .lock()
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(details);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// 購読解除のためのトークン
/// チャネルが先に破棄されていた場合、解除は何もしない
pub struct Subscription {
    id: u64,
    handle: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.handle.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
