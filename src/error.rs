/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::error::Error;
use std::fmt::{Debug, Display};

/// Returned by [`crate::SocowVec::try_reserve`] when the requested capacity overflows
/// `isize::MAX` bytes and cannot be represented by the global allocator.
pub struct TryReserveError {
    pub(crate) requested: usize,
}

impl Display for TryReserveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "capacity overflow: cannot reserve {} elements", self.requested)
    }
}

impl Debug for TryReserveError {
    #[inline(always)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Error for TryReserveError {}
