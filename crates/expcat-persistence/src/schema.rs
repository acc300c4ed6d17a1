//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.
//!
//! Cada tabla de registros guarda sus columnas de clave y filtro más la fila
//! completa en `payload`. `experiment_summary` es una vista con el estado
//! actual de cada experimento.

diesel::table! {
    experiments (experiment_id) {
        experiment_id -> Text,
        project_id -> Text,
        gateway_id -> Text,
        user_name -> Text,
        experiment_name -> Text,
        description -> Nullable<Text>,
        execution_id -> Nullable<Text>,
        resource_host_id -> Nullable<Text>,
        creation_time -> Timestamptz,
        last_update_time -> Timestamptz,
        payload -> Jsonb,
    }
}

diesel::table! {
    processes (process_id) {
        process_id -> Text,
        experiment_id -> Text,
        creation_time -> Timestamptz,
        last_update_time -> Timestamptz,
        payload -> Jsonb,
    }
}

diesel::table! {
    tasks (task_id) {
        task_id -> Text,
        parent_process_id -> Text,
        creation_time -> Timestamptz,
        last_update_time -> Timestamptz,
        payload -> Jsonb,
    }
}

diesel::table! {
    jobs (task_id, job_id) {
        task_id -> Text,
        job_id -> Text,
        process_id -> Text,
        creation_time -> Timestamptz,
        payload -> Jsonb,
    }
}

diesel::table! {
    status_entries (seq) {
        seq -> BigInt,
        owner_kind -> Text,
        owner_id -> Text,
        owner_sub_id -> Text,
        status_id -> Text,
        state -> Text,
        time_of_change -> Timestamptz,
        reason -> Nullable<Text>,
    }
}

diesel::table! {
    experiment_summary (experiment_id) {
        experiment_id -> Text,
        project_id -> Text,
        gateway_id -> Text,
        user_name -> Text,
        name -> Text,
        description -> Text,
        execution_id -> Text,
        resource_host_id -> Text,
        creation_time -> Timestamptz,
        experiment_status -> Nullable<Text>,
        status_update_time -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    experiments,
    processes,
    tasks,
    jobs,
    status_entries,
    experiment_summary,
);
