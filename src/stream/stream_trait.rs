use super::StreamEvent;

pub trait StreamEmit: FnMut(&[u8]) {}
impl<T: FnMut(&[u8])> StreamEmit for T {}

pub trait StreamEventHandler: FnMut(StreamEvent) + Send {}
impl<T: FnMut(StreamEvent) + Send> StreamEventHandler for T {}
