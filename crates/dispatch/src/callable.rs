//! Tuple-based argument marshalling for dispatched callables.
//!
//! A callable taking `n` positional arguments is dispatched together with an
//! `n`-tuple of those arguments. The tuple is unpacked on the executing
//! thread and the elements are passed in declared order. Arities 0 through 8
//! are supported.

use tokio_util::sync::CancellationToken;

/// A one-shot callable that accepts its positional arguments as a tuple.
pub trait Callable<Args>: Send + 'static {
	/// Value produced by the callable.
	type Output;

	/// Invokes the callable with the unpacked argument tuple.
	fn call(self, args: Args) -> Self::Output;
}

/// A one-shot callable that also observes a cancellation token.
///
/// The token is passed after the positional arguments.
pub trait CancelAware<Args>: Send + 'static {
	/// Value produced by the callable.
	type Output;

	/// Invokes the callable with the unpacked argument tuple and the token.
	fn call_with(self, args: Args, token: CancellationToken) -> Self::Output;
}

macro_rules! impl_callable {
	($($arg:ident),*) => {
		impl<Func, Ret, $($arg,)*> Callable<($($arg,)*)> for Func
		where
			Func: FnOnce($($arg),*) -> Ret + Send + 'static,
		{
			type Output = Ret;

			#[allow(non_snake_case, clippy::unused_unit)]
			fn call(self, args: ($($arg,)*)) -> Ret {
				let ($($arg,)*) = args;
				self($($arg),*)
			}
		}

		impl<Func, Ret, $($arg,)*> CancelAware<($($arg,)*)> for Func
		where
			Func: FnOnce($($arg,)* CancellationToken) -> Ret + Send + 'static,
		{
			type Output = Ret;

			#[allow(non_snake_case, clippy::unused_unit)]
			fn call_with(self, args: ($($arg,)*), token: CancellationToken) -> Ret {
				let ($($arg,)*) = args;
				self($($arg,)* token)
			}
		}
	};
}

impl_callable!();
impl_callable!(A1);
impl_callable!(A1, A2);
impl_callable!(A1, A2, A3);
impl_callable!(A1, A2, A3, A4);
impl_callable!(A1, A2, A3, A4, A5);
impl_callable!(A1, A2, A3, A4, A5, A6);
impl_callable!(A1, A2, A3, A4, A5, A6, A7);
impl_callable!(A1, A2, A3, A4, A5, A6, A7, A8);

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn zero_arity_runs_once() {
		let out = Callable::call(|| 7_u8, ());
		assert_eq!(out, 7);
	}

	#[test]
	fn single_argument_tuple_unpacks() {
		let out = Callable::call(|s: String| s.len(), ("four".to_string(),));
		assert_eq!(out, 4);
	}

	#[test]
	fn cancel_aware_receives_token_last() {
		let token = CancellationToken::new();
		token.cancel();
		let out = CancelAware::call_with(|a: i32, b: i32, t: CancellationToken| (a - b, t.is_cancelled()), (10, 3), token);
		assert_eq!(out, (7, true));
	}

	#[test]
	fn mixed_argument_types_keep_positions() {
		let out = Callable::call(
			|a: u8, b: &'static str, c: Vec<i32>, d: Option<char>| format!("{a}-{b}-{c:?}-{d:?}"),
			(1, "two", vec![3], Some('4')),
		);
		assert_eq!(out, "1-two-[3]-Some('4')");
	}

	proptest! {
		#[test]
		fn eight_arguments_arrive_in_declared_order(args in any::<(u8, u16, u32, u64, i8, i16, i32, i64)>()) {
			let seen = Callable::call(
				|a1: u8, a2: u16, a3: u32, a4: u64, a5: i8, a6: i16, a7: i32, a8: i64| (a1, a2, a3, a4, a5, a6, a7, a8),
				args,
			);
			prop_assert_eq!(seen, args);
		}

		#[test]
		fn eight_arguments_with_token_arrive_in_declared_order(args in any::<(u8, u16, u32, u64, i8, i16, i32, i64)>()) {
			let seen = CancelAware::call_with(
				|a1: u8, a2: u16, a3: u32, a4: u64, a5: i8, a6: i16, a7: i32, a8: i64, t: CancellationToken| {
					assert!(!t.is_cancelled());
					(a1, a2, a3, a4, a5, a6, a7, a8)
				},
				args,
				CancellationToken::new(),
			);
			prop_assert_eq!(seen, args);
		}
	}
}
