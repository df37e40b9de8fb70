//! Exported C-variadic entry points.
//!
//! Each wrapper packs its `...` into a `va_list` and calls the `V`
//! trampoline, which does the binding, counting and logging.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int};

use crate::types::{PyObject, _PyArg_Parser};

variadic_fns! {
    fn PyErr_Format(exception: *mut PyObject, format: *const c_char, ...) -> *mut PyObject
        => PyErr_FormatV;
    fn PyUnicode_FromFormat(format: *const c_char, ...) -> *mut PyObject
        => PyUnicode_FromFormatV;
    fn PyBytes_FromFormat(format: *const c_char, ...) -> *mut PyObject
        => PyBytes_FromFormatV;
    fn Py_BuildValue(format: *const c_char, ...) -> *mut PyObject
        => Py_VaBuildValue;
    fn PyArg_ParseTuple(args: *mut PyObject, format: *const c_char, ...) -> c_int
        => PyArg_VaParse;
    fn PyArg_ParseTupleAndKeywords(
        args: *mut PyObject,
        kwargs: *mut PyObject,
        format: *const c_char,
        keywords: *mut *mut c_char,
        ...
    ) -> c_int => PyArg_VaParseTupleAndKeywords;
    fn PyOS_snprintf(buf: *mut c_char, size: usize, format: *const c_char, ...) -> c_int
        => PyOS_vsnprintf;
    fn _PyArg_ParseTuple_SizeT(args: *mut PyObject, format: *const c_char, ...) -> c_int
        => PyArg_VaParse;
    fn _PyArg_ParseTupleAndKeywords_SizeT(
        args: *mut PyObject,
        kwargs: *mut PyObject,
        format: *const c_char,
        keywords: *mut *mut c_char,
        ...
    ) -> c_int => PyArg_VaParseTupleAndKeywords;
    fn _PyArg_ParseTupleAndKeywordsFast(
        args: *mut PyObject,
        kwargs: *mut PyObject,
        parser: *mut _PyArg_Parser,
        ...
    ) -> c_int => _PyArg_VaParseTupleAndKeywordsFast;
    fn _PyArg_ParseTupleAndKeywordsFast_SizeT(
        args: *mut PyObject,
        kwargs: *mut PyObject,
        parser: *mut _PyArg_Parser,
        ...
    ) -> c_int => _PyArg_VaParseTupleAndKeywordsFast_SizeT;
}
