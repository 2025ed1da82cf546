//! Thread-bound session management.
//!
//! The manager either runs work on a session bound to the current thread,
//! or opens a one-shot auto-commit session for the single call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::session::{SqlSession, SqlSessionFactory};

static NEXT_MANAGER_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
	static BOUND_SESSIONS: RefCell<HashMap<usize, SqlSession>> = RefCell::new(HashMap::new());
}

pub struct SqlSessionManager {
	factory: SqlSessionFactory,
	id: usize,
}

impl SqlSessionManager {
	pub fn new(factory: SqlSessionFactory) -> Self {
		Self { factory, id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed) }
	}

	pub fn factory(&self) -> &SqlSessionFactory {
		&self.factory
	}

	/// Binds a fresh session to the current thread; subsequent calls run on
	/// it until [`SqlSessionManager::close`].
	pub fn start_managed_session(&self) -> Result<()> {
		let session = self.factory.open_session()?;
		BOUND_SESSIONS.with(|bound| {
			bound.borrow_mut().insert(self.id, session);
		});
		Ok(())
	}

	pub fn is_managed(&self) -> bool {
		BOUND_SESSIONS.with(|bound| bound.borrow().contains_key(&self.id))
	}

	/// Runs work on the bound session, or on a one-shot auto-commit session
	/// when none is bound.
	pub fn with_session<R>(
		&self,
		work: impl FnOnce(&mut SqlSession) -> Result<R>,
	) -> Result<R> {
		let bound = BOUND_SESSIONS.with(|bound| bound.borrow_mut().remove(&self.id));
		match bound {
			Some(mut session) => {
				let result = work(&mut session);
				BOUND_SESSIONS.with(|bound| {
					bound.borrow_mut().insert(self.id, session);
				});
				result
			}
			None => {
				let mut session = self
					.factory
					.open_session_with(
						self.factory.configuration().settings().default_executor_type,
						true,
					)?;
				let result = work(&mut session);
				let closed = session.close();
				result.and_then(|r| closed.map(|_| r))
			}
		}
	}

	pub fn commit(&self) -> Result<()> {
		self.on_bound(|session| session.commit())
	}

	pub fn rollback(&self) -> Result<()> {
		self.on_bound(|session| session.rollback())
	}

	/// Closes and unbinds the managed session.
	pub fn close(&self) -> Result<()> {
		let session = BOUND_SESSIONS.with(|bound| bound.borrow_mut().remove(&self.id));
		match session {
			Some(mut session) => session.close(),
			None => Err(Error::NoBoundSession),
		}
	}

	fn on_bound<R>(&self, work: impl FnOnce(&mut SqlSession) -> Result<R>) -> Result<R> {
		if !self.is_managed() {
			return Err(Error::NoBoundSession);
		}
		self.with_session(work)
	}
}

impl Drop for SqlSessionManager {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
