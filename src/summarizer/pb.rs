//! Protobuf types for the summarizer RPC, kept in lockstep with
//! `proto/summary.proto` by hand so the build needs no protoc. Field tags
//! and shapes follow prost codegen output.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SummaryRequest {
    #[prost(message, optional, tag = "1")]
    pub task: ::core::option::Option<TaskSummary>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SummaryResponse {
    #[prost(string, tag = "1")]
    pub summary: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub status: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskSummary {
    #[prost(string, tag = "1")]
    pub session_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub session_status: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub started_at: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub ended_at: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub created_at: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "6")]
    pub owner: ::core::option::Option<CustomUser>,
    #[prost(message, optional, tag = "7")]
    pub student: ::core::option::Option<Student>,
    #[prost(message, repeated, tag = "8")]
    pub supervisors: ::prost::alloc::vec::Vec<Lecturer>,
    #[prost(message, optional, tag = "9")]
    pub thesis_info: ::core::option::Option<ThesisInfo>,
    #[prost(message, repeated, tag = "10")]
    pub messages: ::prost::alloc::vec::Vec<MessageSummary>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomUser {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub identifier: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub role: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Faculty {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StudyProgram {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub degree: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub faculty: ::core::option::Option<Faculty>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Student {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub nim: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub email: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub study_program: ::core::option::Option<StudyProgram>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Lecturer {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub nip: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub email: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub study_program: ::core::option::Option<StudyProgram>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ThesisInfo {
    #[prost(string, tag = "1")]
    pub title: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub description: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub progress: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageSummary {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub is_text: bool,
    #[prost(string, tag = "3")]
    pub text: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub file_url: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub file_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "6")]
    pub sender: ::core::option::Option<CustomUser>,
    #[prost(string, tag = "7")]
    pub parent_message_id: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub timestamp: ::prost::alloc::string::String,
}
