//! Purpose: Report expected table states without turning them into errors.
//! Exports: `Outcome`.
//! Invariants: `NotFound`/`AlreadyExists` describe the table named in the call; store
//! failures are never folded into an `Outcome`.

#[must_use]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome<T = ()> {
    Applied(T),
    NotFound,
    AlreadyExists,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Outcome::AlreadyExists)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::NotFound | Outcome::AlreadyExists => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::AlreadyExists => Outcome::AlreadyExists,
        }
    }
}
