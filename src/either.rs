/// Binary result type used as the parse-phase error channel.
///
/// `Left` carries the failure, `Right` the value. Unlike [`Result`] there is no
/// `?` support: every consumer branches explicitly, either with a `match` or
/// through one of the combinators below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    /// Left value, if any.
    pub fn left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    /// Right value, if any.
    pub fn right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Transform the right value, passing a left through untouched.
    pub fn map<T>(self, f: impl FnOnce(R) -> T) -> Either<L, T> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }

    /// Transform the left value, passing a right through untouched.
    pub fn map_left<T>(self, f: impl FnOnce(L) -> T) -> Either<T, R> {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Chain a computation that may itself fail. Short-circuits on `Left`.
    pub fn and_then<T>(self, f: impl FnOnce(R) -> Either<L, T>) -> Either<L, T> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => f(r),
        }
    }

    /// Collapse both arms into a single value.
    pub fn either<T>(self, on_left: impl FnOnce(L) -> T, on_right: impl FnOnce(R) -> T) -> T {
        match self {
            Either::Left(l) => on_left(l),
            Either::Right(r) => on_right(r),
        }
    }

    pub fn into_result(self) -> Result<R, L> {
        match self {
            Either::Left(l) => Err(l),
            Either::Right(r) => Ok(r),
        }
    }
}

impl<L, R> From<Result<R, L>> for Either<L, R> {
    fn from(result: Result<R, L>) -> Self {
        match result {
            Ok(r) => Either::Right(r),
            Err(l) => Either::Left(l),
        }
    }
}
