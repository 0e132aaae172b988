// Messaging - Lock-free hand-off between control tasks and the audio callback

pub mod channels;
