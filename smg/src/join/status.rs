use std::ops::{Add, AddAssign};

/// Which input of a join carried more information.
///
/// `LeftEntailed` means the left state is at least as specific as the right one:
/// every concrete memory the left state describes is also described by the right.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum JoinStatus {
    Equal,
    LeftEntailed,
    RightEntailed,
    Incomparable,
}

impl JoinStatus {
    pub fn swap(self) -> Self {
        match self {
            JoinStatus::LeftEntailed => JoinStatus::RightEntailed,
            JoinStatus::RightEntailed => JoinStatus::LeftEntailed,
            other => other,
        }
    }
}

impl Add for JoinStatus {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (JoinStatus::Equal, other) | (other, JoinStatus::Equal) => other,
            (a, b) if a == b => a,
            _ => JoinStatus::Incomparable,
        }
    }
}

impl AddAssign for JoinStatus {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}
