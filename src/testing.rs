use std::fmt::Debug;
use syn_peg_model::{Error, Result, Value};

/// A wrapper around [`Result`] for fluent assertions in tests.
pub struct TestResult<T> {
    inner: Result<T>,
}

impl<T: Debug> TestResult<T> {
    pub fn new(result: Result<T>) -> Self {
        Self { inner: result }
    }

    /// 1. Asserts success and returns the value.
    pub fn assert_success(self) -> T {
        match self.inner {
            Ok(val) => val,
            Err(e) => {
                panic!(
                    "\n🔴 TEST FAILED (Expected Success, but got Error):\nMessage:  {}\nError:    {:?}\n",
                    e, e
                );
            }
        }
    }

    /// 2. Asserts success and compares the value.
    pub fn assert_success_is<E>(self, expected: E) -> T
    where
        T: PartialEq<E>,
        E: Debug,
    {
        let val = self.assert_success();
        if val != expected {
            panic!(
                "\n🔴 TEST FAILED (Value Mismatch):\nExpected: {:?}\nGot:      {:?}\n",
                expected, val
            );
        }
        val
    }

    /// 3. Asserts failure and returns the error.
    pub fn assert_failure(self) -> Error {
        match self.inner {
            Ok(val) => {
                panic!(
                    "\n🔴 TEST FAILED (Expected Failure, but got Success):\nValue: {:?}\n",
                    val
                );
            }
            Err(e) => e,
        }
    }

    /// 4. Asserts failure with a message containing `expected_msg_part`.
    pub fn assert_failure_contains(self, expected_msg_part: &str) -> Error {
        let err = self.assert_failure();
        let actual_msg = err.to_string();
        if !actual_msg.contains(expected_msg_part) {
            panic!(
                "\n🔴 TEST FAILED (Error Message Mismatch):\nExpected part: {:?}\nActual msg:    {:?}\n",
                expected_msg_part, actual_msg
            );
        }
        err
    }
}

/// Assertions on matcher outcomes, where a mismatch is `Ok(None)`.
impl TestResult<Option<Value>> {
    /// Asserts the input matched and returns the value.
    pub fn assert_match(self) -> Value {
        match self.assert_success() {
            Some(val) => val,
            None => panic!("\n🔴 TEST FAILED (Expected Match, but the input did not match)\n"),
        }
    }

    pub fn assert_match_is(self, expected: impl Into<Value>) -> Value {
        let expected = expected.into();
        let val = self.assert_match();
        if val != expected {
            panic!(
                "\n🔴 TEST FAILED (Value Mismatch):\nExpected: {}\nGot:      {}\n",
                expected, val
            );
        }
        val
    }

    pub fn assert_no_match(self) {
        if let Some(val) = self.assert_success() {
            panic!(
                "\n🔴 TEST FAILED (Expected No Match, but got a Match):\nValue: {}\n",
                val
            );
        }
    }
}

pub trait Testable<T> {
    fn test(self) -> TestResult<T>;
}

impl<T: Debug> Testable<T> for Result<T> {
    fn test(self) -> TestResult<T> {
        TestResult::new(self)
    }
}
