//! The exported C-API surface.
//!
//! One line per function: name and exact C signature. Variadic functions
//! appear only through their `va_list` counterparts; the `...` entry points
//! live in `variadic.rs`.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_double, c_int, c_long, c_longlong, c_ulong, c_void};

use crate::types::{
    Py_UCS4, Py_hash_t, Py_ssize_t, PyGILState_STATE, PyModuleDef, PyObject, PyThreadState,
    PyTypeObject, VaListPtr, _PyArg_Parser,
};

/// Variadic API functions and the `va_list` symbol each one forwards to.
///
/// Several public names may share one `va_list` symbol: the `_SizeT`
/// spellings emitted by older `PY_SSIZE_T_CLEAN` headers reuse the plain one.
pub const VARIADIC_PAIRS: &[(&str, &str)] = &[
    ("PyErr_Format", "PyErr_FormatV"),
    ("PyUnicode_FromFormat", "PyUnicode_FromFormatV"),
    ("PyBytes_FromFormat", "PyBytes_FromFormatV"),
    ("Py_BuildValue", "Py_VaBuildValue"),
    ("PyArg_ParseTuple", "PyArg_VaParse"),
    ("PyArg_ParseTupleAndKeywords", "PyArg_VaParseTupleAndKeywords"),
    ("PyOS_snprintf", "PyOS_vsnprintf"),
    ("_PyArg_ParseTuple_SizeT", "PyArg_VaParse"),
    ("_PyArg_ParseTupleAndKeywords_SizeT", "PyArg_VaParseTupleAndKeywords"),
    ("_PyArg_ParseTupleAndKeywordsFast", "_PyArg_VaParseTupleAndKeywordsFast"),
    (
        "_PyArg_ParseTupleAndKeywordsFast_SizeT",
        "_PyArg_VaParseTupleAndKeywordsFast_SizeT",
    ),
];

capi_symbols! {
    forward {
        // Object protocol
        fn PyObject_Repr(o: *mut PyObject) -> *mut PyObject;
        fn PyObject_Str(o: *mut PyObject) -> *mut PyObject;
        fn PyObject_Type(o: *mut PyObject) -> *mut PyObject;
        fn PyObject_GetAttr(o: *mut PyObject, name: *mut PyObject) -> *mut PyObject;
        fn PyObject_GetAttrString(o: *mut PyObject, name: *const c_char) -> *mut PyObject;
        fn PyObject_SetAttr(o: *mut PyObject, name: *mut PyObject, v: *mut PyObject) -> c_int;
        fn PyObject_SetAttrString(o: *mut PyObject, name: *const c_char, v: *mut PyObject) -> c_int;
        fn PyObject_HasAttrString(o: *mut PyObject, name: *const c_char) -> c_int;
        fn PyObject_RichCompare(a: *mut PyObject, b: *mut PyObject, op: c_int) -> *mut PyObject;
        fn PyObject_RichCompareBool(a: *mut PyObject, b: *mut PyObject, op: c_int) -> c_int;
        fn PyObject_IsTrue(o: *mut PyObject) -> c_int;
        fn PyObject_IsInstance(inst: *mut PyObject, cls: *mut PyObject) -> c_int;
        fn PyObject_Hash(o: *mut PyObject) -> Py_hash_t;
        fn PyObject_Length(o: *mut PyObject) -> Py_ssize_t;
        fn PyObject_GetItem(o: *mut PyObject, key: *mut PyObject) -> *mut PyObject;
        fn PyObject_SetItem(o: *mut PyObject, key: *mut PyObject, v: *mut PyObject) -> c_int;
        fn PyObject_GetIter(o: *mut PyObject) -> *mut PyObject;
        fn PyObject_Call(callable: *mut PyObject, args: *mut PyObject, kwargs: *mut PyObject) -> *mut PyObject;
        fn PyObject_CallObject(callable: *mut PyObject, args: *mut PyObject) -> *mut PyObject;
        fn PyCallable_Check(o: *mut PyObject) -> c_int;
        fn PyIter_Next(o: *mut PyObject) -> *mut PyObject;

        // Reference counting
        fn Py_IncRef(o: *mut PyObject);
        fn Py_DecRef(o: *mut PyObject);

        // Types
        fn PyType_IsSubtype(a: *mut PyTypeObject, b: *mut PyTypeObject) -> c_int;
        fn PyType_Ready(t: *mut PyTypeObject) -> c_int;
        fn PyType_GenericAlloc(t: *mut PyTypeObject, nitems: Py_ssize_t) -> *mut PyObject;

        // Numbers
        fn PyLong_FromLong(v: c_long) -> *mut PyObject;
        fn PyLong_FromLongLong(v: c_longlong) -> *mut PyObject;
        fn PyLong_FromSsize_t(v: Py_ssize_t) -> *mut PyObject;
        fn PyLong_FromUnsignedLong(v: c_ulong) -> *mut PyObject;
        fn PyLong_AsLong(o: *mut PyObject) -> c_long;
        fn PyLong_AsLongLong(o: *mut PyObject) -> c_longlong;
        fn PyLong_AsSsize_t(o: *mut PyObject) -> Py_ssize_t;
        fn PyLong_AsUnsignedLong(o: *mut PyObject) -> c_ulong;
        fn PyLong_AsDouble(o: *mut PyObject) -> c_double;
        fn PyFloat_FromDouble(v: c_double) -> *mut PyObject;
        fn PyFloat_AsDouble(o: *mut PyObject) -> c_double;
        fn PyBool_FromLong(v: c_long) -> *mut PyObject;
        fn PyNumber_Add(a: *mut PyObject, b: *mut PyObject) -> *mut PyObject;
        fn PyNumber_Index(o: *mut PyObject) -> *mut PyObject;

        // Text
        fn PyUnicode_FromString(s: *const c_char) -> *mut PyObject;
        fn PyUnicode_FromStringAndSize(s: *const c_char, size: Py_ssize_t) -> *mut PyObject;
        fn PyUnicode_FromFormatV(format: *const c_char, vargs: VaListPtr) -> *mut PyObject;
        fn PyUnicode_InternFromString(s: *const c_char) -> *mut PyObject;
        fn PyUnicode_AsUTF8(o: *mut PyObject) -> *const c_char;
        fn PyUnicode_AsUTF8AndSize(o: *mut PyObject, size: *mut Py_ssize_t) -> *const c_char;
        fn PyUnicode_GetLength(o: *mut PyObject) -> Py_ssize_t;
        fn PyUnicode_ReadChar(o: *mut PyObject, index: Py_ssize_t) -> Py_UCS4;
        fn PyUnicode_Concat(left: *mut PyObject, right: *mut PyObject) -> *mut PyObject;
        fn PyUnicode_Compare(left: *mut PyObject, right: *mut PyObject) -> c_int;
        fn PyUnicode_CompareWithASCIIString(o: *mut PyObject, s: *const c_char) -> c_int;

        // Bytes
        fn PyBytes_FromString(s: *const c_char) -> *mut PyObject;
        fn PyBytes_FromStringAndSize(s: *const c_char, size: Py_ssize_t) -> *mut PyObject;
        fn PyBytes_FromFormatV(format: *const c_char, vargs: VaListPtr) -> *mut PyObject;
        fn PyBytes_AsString(o: *mut PyObject) -> *mut c_char;
        fn PyBytes_Size(o: *mut PyObject) -> Py_ssize_t;

        // Tuples
        fn PyTuple_New(size: Py_ssize_t) -> *mut PyObject;
        fn PyTuple_Size(o: *mut PyObject) -> Py_ssize_t;
        fn PyTuple_GetItem(o: *mut PyObject, pos: Py_ssize_t) -> *mut PyObject;
        fn PyTuple_SetItem(o: *mut PyObject, pos: Py_ssize_t, item: *mut PyObject) -> c_int;
        fn PyTuple_GetSlice(o: *mut PyObject, low: Py_ssize_t, high: Py_ssize_t) -> *mut PyObject;

        // Lists
        fn PyList_New(len: Py_ssize_t) -> *mut PyObject;
        fn PyList_Size(list: *mut PyObject) -> Py_ssize_t;
        fn PyList_GetItem(list: *mut PyObject, index: Py_ssize_t) -> *mut PyObject;
        fn PyList_SetItem(list: *mut PyObject, index: Py_ssize_t, item: *mut PyObject) -> c_int;
        fn PyList_Append(list: *mut PyObject, item: *mut PyObject) -> c_int;
        fn PyList_Insert(list: *mut PyObject, index: Py_ssize_t, item: *mut PyObject) -> c_int;
        fn PyList_AsTuple(list: *mut PyObject) -> *mut PyObject;

        // Dicts
        fn PyDict_New() -> *mut PyObject;
        fn PyDict_GetItem(p: *mut PyObject, key: *mut PyObject) -> *mut PyObject;
        fn PyDict_GetItemString(p: *mut PyObject, key: *const c_char) -> *mut PyObject;
        fn PyDict_SetItem(p: *mut PyObject, key: *mut PyObject, val: *mut PyObject) -> c_int;
        fn PyDict_SetItemString(p: *mut PyObject, key: *const c_char, val: *mut PyObject) -> c_int;
        fn PyDict_DelItem(p: *mut PyObject, key: *mut PyObject) -> c_int;
        fn PyDict_Size(p: *mut PyObject) -> Py_ssize_t;
        fn PyDict_Keys(p: *mut PyObject) -> *mut PyObject;
        fn PyDict_Next(
            p: *mut PyObject,
            ppos: *mut Py_ssize_t,
            pkey: *mut *mut PyObject,
            pvalue: *mut *mut PyObject,
        ) -> c_int;

        // Sequences
        fn PySequence_Check(o: *mut PyObject) -> c_int;
        fn PySequence_Size(o: *mut PyObject) -> Py_ssize_t;
        fn PySequence_GetItem(o: *mut PyObject, i: Py_ssize_t) -> *mut PyObject;

        // Exceptions
        fn PyErr_SetString(exception: *mut PyObject, message: *const c_char);
        fn PyErr_SetObject(exception: *mut PyObject, value: *mut PyObject);
        fn PyErr_FormatV(exception: *mut PyObject, format: *const c_char, vargs: VaListPtr) -> *mut PyObject;
        fn PyErr_Occurred() -> *mut PyObject;
        fn PyErr_Clear();
        fn PyErr_Print();
        fn PyErr_Fetch(
            ptype: *mut *mut PyObject,
            pvalue: *mut *mut PyObject,
            ptraceback: *mut *mut PyObject,
        );
        fn PyErr_Restore(ptype: *mut PyObject, pvalue: *mut PyObject, ptraceback: *mut PyObject);
        fn PyErr_NoMemory() -> *mut PyObject;
        fn PyErr_ExceptionMatches(exception: *mut PyObject) -> c_int;
        fn PyErr_NewException(name: *const c_char, base: *mut PyObject, dict: *mut PyObject) -> *mut PyObject;
        fn PyErr_WarnEx(category: *mut PyObject, message: *const c_char, stack_level: Py_ssize_t) -> c_int;

        // Modules and imports
        fn PyModule_Create2(def: *mut PyModuleDef, api_version: c_int) -> *mut PyObject;
        fn PyModule_AddObject(module: *mut PyObject, name: *const c_char, value: *mut PyObject) -> c_int;
        fn PyModule_AddIntConstant(module: *mut PyObject, name: *const c_char, value: c_long) -> c_int;
        fn PyModule_AddStringConstant(module: *mut PyObject, name: *const c_char, value: *const c_char) -> c_int;
        fn PyModule_GetDict(module: *mut PyObject) -> *mut PyObject;
        fn PyModule_GetState(module: *mut PyObject) -> *mut c_void;
        fn PyImport_ImportModule(name: *const c_char) -> *mut PyObject;
        fn PyImport_Import(name: *mut PyObject) -> *mut PyObject;
        fn PyCapsule_GetPointer(capsule: *mut PyObject, name: *const c_char) -> *mut c_void;
        fn PyCapsule_Import(name: *const c_char, no_block: c_int) -> *mut c_void;

        // Argument parsing and building
        fn PyArg_VaParse(args: *mut PyObject, format: *const c_char, vargs: VaListPtr) -> c_int;
        fn PyArg_VaParseTupleAndKeywords(
            args: *mut PyObject,
            kwargs: *mut PyObject,
            format: *const c_char,
            keywords: *mut *mut c_char,
            vargs: VaListPtr,
        ) -> c_int;
        fn _PyArg_VaParseTupleAndKeywordsFast(
            args: *mut PyObject,
            kwargs: *mut PyObject,
            parser: *mut _PyArg_Parser,
            vargs: VaListPtr,
        ) -> c_int;
        fn _PyArg_VaParseTupleAndKeywordsFast_SizeT(
            args: *mut PyObject,
            kwargs: *mut PyObject,
            parser: *mut _PyArg_Parser,
            vargs: VaListPtr,
        ) -> c_int;
        fn Py_VaBuildValue(format: *const c_char, vargs: VaListPtr) -> *mut PyObject;

        // Threads and the interpreter lock
        fn PyGILState_Ensure() -> PyGILState_STATE;
        fn PyGILState_Release(state: PyGILState_STATE);
        fn PyEval_SaveThread() -> *mut PyThreadState;
        fn PyEval_RestoreThread(tstate: *mut PyThreadState);
        fn PyThreadState_Get() -> *mut PyThreadState;
        fn Py_IsInitialized() -> c_int;

        // Memory
        fn PyMem_Malloc(size: usize) -> *mut c_void;
        fn PyMem_Realloc(p: *mut c_void, size: usize) -> *mut c_void;
        fn PyMem_Free(p: *mut c_void);
        fn PyObject_Malloc(size: usize) -> *mut c_void;
        fn PyObject_Free(p: *mut c_void);

        // OS helpers
        fn PyOS_vsnprintf(buf: *mut c_char, size: usize, format: *const c_char, vargs: VaListPtr) -> c_int;
    }
    noreturn {
        fn Py_FatalError(message: *const c_char);
        fn _Py_FatalErrorFunc(func: *const c_char, message: *const c_char);
        fn Py_Exit(status: c_int);
        fn PyThread_exit_thread();
    }
    unimplemented {
        fn PyAIter_Check(o: *mut PyObject) -> c_int;
        fn PyArg_ValidateKeywordArguments(kwargs: *mut PyObject) -> c_int;
        fn PyByteArray_Concat(a: *mut PyObject, b: *mut PyObject) -> *mut PyObject;
        fn PyByteArray_FromObject(o: *mut PyObject) -> *mut PyObject;
        fn PyBytes_Repr(o: *mut PyObject, smartquotes: c_int) -> *mut PyObject;
        fn PyCFunction_Call(
            func: *mut PyObject,
            args: *mut PyObject,
            kwargs: *mut PyObject,
        ) -> *mut PyObject;
        fn PyCell_Get(cell: *mut PyObject) -> *mut PyObject;
        fn PyCell_New(o: *mut PyObject) -> *mut PyObject;
        fn PyCell_Set(cell: *mut PyObject, value: *mut PyObject) -> c_int;
        fn PyCodec_Decode(
            o: *mut PyObject,
            encoding: *const c_char,
            errors: *const c_char,
        ) -> *mut PyObject;
        fn PyCodec_Encode(
            o: *mut PyObject,
            encoding: *const c_char,
            errors: *const c_char,
        ) -> *mut PyObject;
        fn PyCodec_KnownEncoding(encoding: *const c_char) -> c_int;
        fn PyCodec_Register(search_function: *mut PyObject) -> c_int;
        fn PyContext_CopyCurrent() -> *mut PyObject;
        fn PyContext_New() -> *mut PyObject;
        fn PyContext_Enter(context: *mut PyObject) -> c_int;
        fn PyContext_Exit(context: *mut PyObject) -> c_int;
        fn PyDict_MergeFromSeq2(a: *mut PyObject, seq2: *mut PyObject, overwrite: c_int) -> c_int;
        fn PyErr_ProgramText(filename: *const c_char, lineno: c_int) -> *mut PyObject;
        fn PyErr_SetInterrupt();
        fn PyErr_SetInterruptEx(signum: c_int) -> c_int;
        fn PyErr_SyntaxLocation(filename: *const c_char, lineno: c_int);
        fn PyEval_AcquireLock();
        fn PyEval_AcquireThread(tstate: *mut PyThreadState);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use capishim_core::Contract;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = Symbol::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), SYMBOLS.len());
        assert_eq!(Symbol::ALL.len(), SYMBOLS.len());
    }

    #[test]
    fn ids_index_the_declaration_table() {
        for symbol in Symbol::ALL {
            assert_eq!(
                symbol.decl().name.to_str().unwrap(),
                symbol.name(),
                "{symbol:?}"
            );
            assert_eq!(SYMBOLS[symbol.id().index()], symbol.decl());
        }
    }

    #[test]
    fn noreturn_symbols_follow_forwarded_ones() {
        let noreturn: Vec<_> = Symbol::ALL
            .iter()
            .filter(|s| s.decl().contract == Contract::NoReturn)
            .map(|s| s.name())
            .collect();
        assert_eq!(
            noreturn,
            ["Py_FatalError", "_Py_FatalErrorFunc", "Py_Exit", "PyThread_exit_thread"]
        );
    }

    #[test]
    fn unimplemented_symbols_come_last() {
        let first = Symbol::ALL
            .iter()
            .position(|s| s.decl().contract == Contract::Unimplemented)
            .unwrap();
        assert_eq!(Symbol::ALL[first], Symbol::PyAIter_Check);
        assert!(
            Symbol::ALL[first..]
                .iter()
                .all(|s| s.decl().contract == Contract::Unimplemented)
        );
        assert_eq!(Symbol::ALL.len() - first, 24);
        assert_eq!(
            Symbol::PyCell_New.signature(),
            "PyCell_New(o: *mut PyObject) -> *mut PyObject"
        );
        assert_eq!(Symbol::PyEval_AcquireLock.signature(), "PyEval_AcquireLock()");
    }

    #[test]
    fn signatures_render_the_declaration() {
        let list_new = Symbol::PyList_New.signature();
        assert!(list_new.starts_with("PyList_New(len"), "{list_new}");
        assert!(list_new.contains("Py_ssize_t"), "{list_new}");
        assert!(list_new.ends_with(") -> *mut PyObject"), "{list_new}");
        assert_eq!(Symbol::PyErr_Clear.signature(), "PyErr_Clear()");
        assert!(Symbol::Py_Exit.signature().ends_with(") -> !"));
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Symbol::from_name("PyDict_New"), Some(Symbol::PyDict_New));
        assert_eq!(Symbol::from_name("PyDict_Nope"), None);
    }

    #[test]
    fn every_variadic_api_has_a_va_list_counterpart() {
        for (public, name) in VARIADIC_PAIRS {
            assert!(Symbol::from_name(public).is_none(), "{public}");
            let symbol = Symbol::from_name(name).unwrap();
            assert!(symbol.signature().contains("VaListPtr"), "{name}");
            assert_eq!(symbol.decl().contract, Contract::Returns, "{name}");
        }
    }

    #[test]
    fn size_t_spellings_share_the_plain_va_list_symbol() {
        let targets = |public: &str| {
            VARIADIC_PAIRS
                .iter()
                .find(|(p, _)| *p == public)
                .map(|(_, v)| *v)
        };
        assert_eq!(targets("_PyArg_ParseTuple_SizeT"), targets("PyArg_ParseTuple"));
        assert_eq!(
            targets("_PyArg_ParseTupleAndKeywords_SizeT"),
            targets("PyArg_ParseTupleAndKeywords")
        );
        assert_eq!(
            targets("_PyArg_ParseTupleAndKeywordsFast_SizeT"),
            Some("_PyArg_VaParseTupleAndKeywordsFast_SizeT")
        );
        let publics: HashSet<_> = VARIADIC_PAIRS.iter().map(|(p, _)| p).collect();
        assert_eq!(publics.len(), VARIADIC_PAIRS.len());
    }
}
