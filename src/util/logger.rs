use std::fmt::{Display, Formatter};

use super::Log;

impl<T> Log<T> {
    /// Whether messages of `level` should be printed under this label.
    pub fn covers<U>(&self, level: &Log<U>) -> bool {
        self.rank() >= level.rank()
    }

    /// The attached label, absent for [Log::None].
    pub fn label(&self) -> Option<&T> {
        match self {
            Log::None => None,
            Log::Default(label) | Log::Success(label) | Log::Result(label) | Log::Verbose(label) => {
                Some(label)
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.label() {
            Some(label) => write!(f, "{}", label),
            None => Ok(()),
        }
    }
}
