//! Bounded, per-thread conversation memory.
//!
//! Each thread keeps at most `window` messages; appending past the window
//! evicts the oldest first. [`ConversationMemory::reset`] switches to a
//! fresh [`ThreadId`] without deleting the old thread, so a caller holding
//! the previous id still reads its last state.
//!
//! Threads are locked independently; the thread map is only locked long
//! enough to look up or insert a thread. Locks are taken in the order
//! current id, thread map, thread.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::models::{Message, Role, ThreadId};

pub const DEFAULT_WINDOW: usize = 10;

type Thread = Arc<Mutex<VecDeque<Message>>>;

pub struct ConversationMemory {
    window: usize,
    current: RwLock<ThreadId>,
    threads: RwLock<HashMap<ThreadId, Thread>>,
}

impl ConversationMemory {
    /// # Errors
    ///
    /// [`Error::Config`] when `window` is zero.
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::Config("memory window must be >= 1".to_string()));
        }
        Ok(Self {
            window,
            current: RwLock::new(ThreadId::new()),
            threads: RwLock::new(HashMap::new()),
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn current_thread(&self) -> ThreadId {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the current thread, creating it on first use, and return
    /// the id of the thread that received the message.
    ///
    /// The current id stays read-locked until the push completes, so a
    /// concurrent [`reset`](Self::reset) lands either before or after it.
    pub fn append(&self, role: Role, content: impl Into<String>) -> ThreadId {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        let id = *current;
        self.push(&self.thread_or_create(id), Message::new(role, content));
        id
    }

    /// Append to a thread created earlier by this memory.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `id` names no known thread.
    pub fn append_to(&self, id: &ThreadId, role: Role, content: impl Into<String>) -> Result<()> {
        let thread = self
            .thread(id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown thread {}", id)))?;
        self.push(&thread, Message::new(role, content));
        Ok(())
    }

    /// Record retrieved context as a system message on the current thread.
    pub fn add_context(&self, context: &str, source: &str) {
        self.append(
            Role::System,
            format!("Context from {}: {}", source, context),
        );
    }

    /// Messages of the current thread, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.history_of(&self.current_thread()).unwrap_or_default()
    }

    /// Messages of any thread this memory has seen, or `None` if unknown.
    pub fn history_of(&self, id: &ThreadId) -> Option<Vec<Message>> {
        self.thread(id).map(|thread| {
            thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect()
        })
    }

    /// Switch to a new, empty thread and return its id.
    ///
    /// The previous thread is kept; only the current handle moves.
    pub fn reset(&self) -> ThreadId {
        let id = ThreadId::new();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = id;
        id
    }

    /// Number of threads holding at least one message.
    pub fn thread_count(&self) -> usize {
        self.threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn thread(&self, id: &ThreadId) -> Option<Thread> {
        self.threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn thread_or_create(&self, id: ThreadId) -> Thread {
        if let Some(thread) = self.thread(&id) {
            return thread;
        }
        self.threads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }

    fn push(&self, thread: &Thread, message: Message) {
        let mut messages = thread.lock().unwrap_or_else(PoisonError::into_inner);
        messages.push_back(message);
        while messages.len() > self.window {
            messages.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(ConversationMemory::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn window_keeps_most_recent() {
        let window = 4;
        let memory = ConversationMemory::new(window).unwrap();
        for i in 0..window + 5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            memory.append(role, format!("m{}", i));
        }
        let history = memory.history();
        assert!(history.len() <= window);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m5", "m6", "m7", "m8"]);
    }

    #[test]
    fn window_larger_than_five_keeps_last_five() {
        let memory = ConversationMemory::new(DEFAULT_WINDOW).unwrap();
        for i in 0..DEFAULT_WINDOW + 5 {
            memory.append(Role::User, format!("m{}", i));
        }
        let history = memory.history();
        assert_eq!(history.len(), DEFAULT_WINDOW);
        let tail: Vec<&str> = history[history.len() - 5..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(tail, vec!["m10", "m11", "m12", "m13", "m14"]);
    }

    #[test]
    fn reset_starts_fresh_and_keeps_old_thread() {
        let memory = ConversationMemory::new(10).unwrap();
        memory.append(Role::User, "hello");
        memory.append(Role::Assistant, "hi there");
        let old = memory.current_thread();

        let new = memory.reset();
        assert_ne!(old, new);
        assert_eq!(memory.current_thread(), new);
        assert!(memory.history().is_empty());

        let kept = memory.history_of(&old).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].role, Role::User);

        memory.append(Role::User, "new topic");
        assert_eq!(memory.history_of(&old).unwrap().len(), 2);
        assert_eq!(memory.thread_count(), 2);
    }

    #[test]
    fn append_to_old_thread() {
        let memory = ConversationMemory::new(3).unwrap();
        memory.append(Role::User, "first");
        let old = memory.current_thread();
        memory.reset();

        memory.append_to(&old, Role::Assistant, "late reply").unwrap();
        assert_eq!(memory.history_of(&old).unwrap().len(), 2);
        assert!(memory.history().is_empty());

        let unknown = ThreadId::new();
        assert!(matches!(
            memory.append_to(&unknown, Role::User, "x"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(memory.history_of(&unknown).is_none());
    }

    #[test]
    fn concurrent_reset_keeps_appends_on_the_reported_thread() {
        let memory = Arc::new(ConversationMemory::new(10_000).unwrap());
        let appender = {
            let memory = Arc::clone(&memory);
            std::thread::spawn(move || {
                (0..2_000)
                    .map(|i| (memory.append(Role::User, format!("m{}", i)), i))
                    .collect::<Vec<_>>()
            })
        };
        let resetter = {
            let memory = Arc::clone(&memory);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    memory.reset();
                }
            })
        };

        let appended = appender.join().unwrap();
        resetter.join().unwrap();

        for (id, i) in &appended {
            let history = memory.history_of(id).unwrap();
            assert!(history.iter().any(|m| m.content == format!("m{}", i)));
        }
        let total: usize = appended
            .iter()
            .map(|(id, _)| *id)
            .collect::<std::collections::HashSet<_>>()
            .iter()
            .map(|id| memory.history_of(id).unwrap().len())
            .sum();
        assert_eq!(total, appended.len());

        // Once appends move on to a newer thread they never return to an
        // older one.
        let mut seen = std::collections::HashSet::new();
        for pair in appended.windows(2) {
            if pair[0].0 != pair[1].0 {
                assert!(seen.insert(pair[0].0));
                assert!(!seen.contains(&pair[1].0));
            }
        }
    }

    #[test]
    fn context_becomes_system_message() {
        let memory = ConversationMemory::new(5).unwrap();
        memory.add_context("Paris is the capital.", "geo.txt");
        let history = memory.history();
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[0].content, "Context from geo.txt: Paris is the capital.");
    }
}
