//! Utility macros for reducing boilerplate

/// Implement `FromRef<AppState>` so handlers can extract one component of
/// the application state directly.
///
/// ```ignore
/// impl_from_ref!(JourneyService, journeys);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for JourneyService {
///     fn from_ref(state: &AppState) -> Self {
///         state.journeys.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
