//! GhostToken - a zero-sized session brand.
//!
//! The GhostToken mints a unique, invariant lifetime `'brand` per call to
//! [`GhostToken::new`]. Types that carry the same `'brand` (lattice grids, monomer
//! stores, bond graphs) are statically provable members of one simulation session;
//! the type system rejects mixing arrays from two different `initialize` calls even
//! though nothing about the brand is checked at runtime.
//!
//! ## Core invariant (linearity)
//!
//! `GhostToken<'brand>` is intentionally **not** `Copy`/`Clone`.
//! This makes it a *linear* capability: any safe API that can produce `&mut T`
//! requires `&mut GhostToken<'brand>`, and Rust guarantees you cannot have two
//! live mutable borrows of the same token simultaneously.

/// Invariant lifetime definitions for branding.
pub mod invariant;

pub use invariant::InvariantLifetime;

/// A zero-sized token that brands a single simulation session.
///
/// The token uses a phantom type parameter to create branded types,
/// ensuring type-level separation between different token scopes.
#[derive(Debug)]
pub struct GhostToken<'brand>(InvariantLifetime<'brand>);

impl<'brand> GhostToken<'brand> {
    /// Creates a new token and executes a closure with it
    ///
    /// This is the primary way to create and use GhostTokens: every call mints a
    /// fresh, unique `'brand` that cannot unify with any other call's brand.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bfm_engine::token::GhostToken;
    ///
    /// let result = GhostToken::new(|_token| 100);
    /// assert_eq!(result, 100);
    /// ```
    pub fn new<F, R>(f: F) -> R
    where
        F: for<'new_brand> FnOnce(GhostToken<'new_brand>) -> R,
    {
        f(GhostToken(InvariantLifetime::default()))
    }

    // NOTE: we intentionally keep the public surface small. If you need a
    // `&mut GhostToken<'brand>` for iterator pipelines, just take a mutable
    // borrow of the token inside the `new` closure.

    /// Creates a GhostToken from a raw invariant lifetime.
    ///
    /// # Safety
    ///
    /// This is an internal API. The caller must ensure that the lifetime `'brand`
    /// is used correctly to enforce linearity and uniqueness where required.
    #[inline(always)]
    pub(crate) const fn from_invariant(invariant: InvariantLifetime<'brand>) -> Self {
        GhostToken(invariant)
    }
}

impl<'brand> GhostToken<'brand> {
    /// Returns a reference to the token (useful for capturing in closures).
    #[inline(always)]
    pub const fn as_ref(&self) -> &Self {
        self
    }

    /// Returns whether the token represents a valid branding scope.
    ///
    /// This is always true for valid tokens, but allows for const evaluation.
    #[inline(always)]
    pub const fn is_valid(&self) -> bool {
        true
    }

    /// Creates a new branded scope nested within the current one.
    ///
    /// This is functionally equivalent to `GhostToken::new`, but allows
    /// method-chaining style and clarifies intent when creating sub-scopes
    /// for temporary views or nested data structures.
    ///
    /// # Example
    ///
    /// ```
    /// use bfm_engine::token::GhostToken;
    ///
    /// GhostToken::new(|token| {
    ///     // Do some work with `token`
    ///
    ///     // Create a temporary sub-scope
    ///     token.with_scoped(|_sub_token| {
    ///         // Work with `sub_token` is isolated
    ///     });
    /// });
    /// ```
    #[inline(always)]
    pub fn with_scoped<F, R>(&self, f: F) -> R
    where
        F: for<'sub> FnOnce(GhostToken<'sub>) -> R,
    {
        Self::new(f)
    }
}

// NOTE:
// `GhostToken` is intentionally NOT `Copy`/`Clone`.
//
// This token is a linear capability: duplicating it would allow creating multiple
// simultaneous `&mut GhostToken<'brand>` values (by taking `&mut` of two copies),
// which would break the core exclusivity invariant needed to safely expose `&mut T`
// from `&Ghost*Cell<T>`.

// Concurrency notes:
// - `GhostToken<'brand>` contains no data and exists only as a compile-time capability.
// - Making it `Sync` is sound: sharing `&GhostToken<'brand>` across threads only enables
//   immutable, token-gated reads (`&T`), which are already constrained by `T: Sync` via
//   the usual `Sync` bounds on the cells themselves.
// - Exclusive mutation still requires `&mut GhostToken<'brand>`, which Rust borrowing
//   prevents from coexisting with any shared references to the same token.
unsafe impl<'brand> Sync for GhostToken<'brand> {}
